use super::EmailMessage;
use crate::models::{BookingDetails, ContactForm, ContactKind};

const STYLE: &str = "body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }
      .container { max-width: 600px; margin: 0 auto; padding: 20px; }
      .header { background: #2f4858; color: white; padding: 24px; text-align: center; }
      .content { padding: 24px; background: #f9f9f9; }
      .row { padding: 8px 0; border-bottom: 1px solid #eee; }
      .label { font-weight: bold; }";

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Minor units to `$12,345.67`.
pub fn format_money(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let minor = minor.unsigned_abs();
    let whole = (minor / 100).to_string();
    let cents = minor % 100;

    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{sign}${grouped}.{cents:02}")
}

fn row(label: &str, value: &str) -> String {
    format!(
        "<div class=\"row\"><span class=\"label\">{}:</span> {}</div>",
        label,
        escape_html(value)
    )
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title>\
         <style>{STYLE}</style></head><body><div class=\"container\">{body}</div></body></html>"
    )
}

pub fn booking_confirmation(details: &BookingDetails) -> EmailMessage {
    let b = &details.booking;
    let dates = &details.experience_date;

    let body = format!(
        "<div class=\"header\"><h1>¡Reserva confirmada!</h1></div>\
         <div class=\"content\">\
         <h2>Hola {name},</h2>\
         <p>Tu reserva ha sido confirmada. Estos son los detalles:</p>\
         <h3>{title}</h3>{rows}\
         <p>Te contactaremos 48 horas antes de la salida para confirmar detalles y equipo.</p>\
         <p>¡Nos vemos en la montaña!</p></div>",
        name = escape_html(&b.client_name),
        title = escape_html(&details.experience.title),
        rows = [
            row("Fecha de inicio", &dates.start_date.format("%d/%m/%Y").to_string()),
            row("Fecha de fin", &dates.end_date.format("%d/%m/%Y").to_string()),
            row("Personas", &b.attendees.to_string()),
            row("Pagado", &format_money(b.paid_amount)),
            row("Total", &format_money(b.total_amount)),
        ]
        .concat(),
    );

    EmailMessage {
        to: b.client_email.clone(),
        subject: format!("Confirmación de reserva - {}", details.experience.title),
        html: page("Confirmación de reserva", &body),
        reply_to: None,
    }
}

pub fn contact_notification(admin_email: &str, form: &ContactForm) -> EmailMessage {
    let heading = match form.kind {
        ContactKind::CustomGuide => "Solicitud de guía personalizado",
        ContactKind::General => "Contacto general",
    };

    let mut rows = vec![row("Nombre", &form.name), row("Email", &form.email)];
    if let Some(phone) = &form.phone {
        rows.push(row("Teléfono", phone));
    }
    if form.kind == ContactKind::CustomGuide {
        let extras = [
            ("Rango de fechas", &form.date_range),
            ("Tipo de montaña", &form.mountain_type),
            ("Experiencia previa", &form.experience),
            ("Presupuesto", &form.budget),
        ];
        for (label, value) in extras {
            if let Some(value) = value {
                rows.push(row(label, value));
            }
        }
    }
    rows.push(row("Mensaje", &form.message));

    let body = format!(
        "<div class=\"header\"><h1>{heading}</h1></div><div class=\"content\">{}</div>",
        rows.concat()
    );

    EmailMessage {
        to: admin_email.to_string(),
        subject: format!("{heading} - {}", form.name),
        html: page(heading, &body),
        reply_to: Some(form.email.clone()),
    }
}
