use hmac::{Hmac, Mac};
use rand::Rng;
use rusqlite::Connection;
use sha1::Sha1;

use crate::db::queries::users;

type HmacSha1 = Hmac<Sha1>;

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
const STEP_SECS: i64 = 30;
const DIGITS: u32 = 6;
const SECRET_BYTES: usize = 20;
const BACKUP_CODE_COUNT: usize = 10;
const BACKUP_CODE_LEN: usize = 10;

pub const ISSUER: &str = "Cumbre";

/// RFC 4648 base32, unpadded.
pub fn base32_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits = 0;

    for &b in bytes {
        buffer = (buffer << 8) | b as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

/// Accepts lowercase, spaces and trailing padding. `None` on any other character.
pub fn base32_decode(s: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(s.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;

    for c in s.chars().filter(|c| !c.is_whitespace() && *c != '=') {
        if !c.is_ascii() {
            return None;
        }
        let c = c.to_ascii_uppercase() as u8;
        let value = ALPHABET.iter().position(|&a| a == c)? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }
    Some(out)
}

pub fn generate_secret() -> String {
    let bytes: [u8; SECRET_BYTES] = rand::thread_rng().gen();
    base32_encode(&bytes)
}

/// HOTP value for one counter (RFC 4226 dynamic truncation).
pub fn hotp(key: &[u8], counter: u64) -> u32 {
    let mut mac = HmacSha1::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let code = ((digest[offset] as u32 & 0x7f) << 24)
        | ((digest[offset + 1] as u32) << 16)
        | ((digest[offset + 2] as u32) << 8)
        | digest[offset + 3] as u32;
    code % 10u32.pow(DIGITS)
}

pub fn totp_at(key: &[u8], unix_time: i64) -> String {
    let counter = (unix_time / STEP_SECS) as u64;
    format!("{:0width$}", hotp(key, counter), width = DIGITS as usize)
}

/// Accepts the current step and one step either side.
pub fn verify_totp(secret: &str, token: &str, unix_time: i64) -> bool {
    let token = token.trim();
    if token.len() != DIGITS as usize || !token.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let Some(key) = base32_decode(secret) else {
        return false;
    };

    [-1i64, 0, 1]
        .iter()
        .any(|drift| totp_at(&key, unix_time + drift * STEP_SECS) == token)
}

pub fn otpauth_url(account: &str, secret: &str) -> String {
    format!(
        "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits={DIGITS}&period={STEP_SECS}",
        issuer = ISSUER,
        account = account.replace(' ', "%20"),
    )
}

pub fn generate_backup_codes() -> Vec<String> {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..BACKUP_CODE_COUNT)
        .map(|_| {
            (0..BACKUP_CODE_LEN)
                .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
                .collect()
        })
        .collect()
}

/// Checks `token` against the user's stored secret, enabled or not.
pub fn verify_user_token(conn: &Connection, user_id: &str, token: &str, now: i64) -> anyhow::Result<bool> {
    let Some(user) = users::get_user(conn, user_id)? else {
        return Ok(false);
    };
    let Some(secret) = user.two_factor_secret else {
        tracing::warn!(user_id = %user_id, "2FA secret not set");
        return Ok(false);
    };

    let ok = verify_totp(&secret, token, now);
    if !ok {
        tracing::warn!(user_id = %user_id, "invalid 2FA token");
    }
    Ok(ok)
}

/// Removes `code` from the user's backup codes. Each code works once.
pub fn consume_backup_code(conn: &Connection, user_id: &str, code: &str) -> anyhow::Result<bool> {
    let Some(user) = users::get_user(conn, user_id)? else {
        return Ok(false);
    };

    let code = code.trim().to_ascii_uppercase();
    let remaining: Vec<String> = user
        .backup_codes
        .iter()
        .filter(|c| **c != code)
        .cloned()
        .collect();
    if remaining.len() == user.backup_codes.len() {
        return Ok(false);
    }

    users::set_backup_codes(conn, user_id, &remaining)?;
    tracing::info!(user_id = %user_id, remaining = remaining.len(), "backup code used");
    Ok(true)
}
