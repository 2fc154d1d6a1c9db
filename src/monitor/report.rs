use pmon::util;

use crate::slots::SlotMatch;

/// Telegram rejects over-long messages and an error chain can be huge, so
/// fatal reports are cut here.
const FATAL_DETAIL_MAX: usize = 200;

pub fn run_started() -> String {
    format!(
        "🤖 <b>Monitor de Reservas - EJECUCIÓN INICIADA</b>\n\
         📅 {}\n\
         🔔 Verificando disponibilidad...",
        util::now_full(),
    )
}

pub fn slot_alert(slot: &SlotMatch, url: &str) -> String {
    format!(
        "🚨 <b>¡HORARIO DISPONIBLE!</b> 🚨\n\
         \n\
         🎾 <b>Club:</b> Tiro Federal\n\
         ⏰ <b>Horario:</b> {} (visto x{})\n\
         📅 <b>Fecha detección:</b> {}\n\
         🔗 <b>Enlace:</b> {}\n\
         \n\
         ⚡ <i>¡Corré a reservar!</i>",
        slot.label,
        slot.occurrences,
        util::now_short(),
        url,
    )
}

pub fn no_availability() -> String {
    format!(
        "📭 <b>Sin disponibilidad</b>\n\
         🕒 {}\n\
         ⚠️ No hay horarios 20-22 disponibles",
        util::now_time(),
    )
}

pub fn reserve_success(label: &str) -> String {
    format!(
        "✅ <b>¡RESERVA AUTOMÁTICA EXITOSA!</b>\n\
         \n\
         🎾 Horario reservado: {label}\n\
         📅 Fecha: {}\n\
         🕒 Hora reserva: {}\n\
         \n\
         🏆 <i>¡Listo! Tenés la cancha. Igual entrá a verificar, el click no es garantía.</i>",
        util::now_day(),
        util::now_time(),
    )
}

pub fn reserve_manual(label: &str) -> String {
    format!(
        "⚠️ <b>Reserva manual requerida</b>\n\
         \n\
         🎾 Horario: {label}\n\
         🔘 No se encontró el botón de reserva. Entrá y reservalo vos."
    )
}

pub fn login_error() -> String {
    "❌ Error en login - Revisar credenciales".to_owned()
}

pub fn login_ambiguous() -> String {
    "⚠️ <b>Login sin confirmar</b>\n\
     La página no dio señales claras de sesión iniciada.\n\
     El escaneo sigue, pero puede estar corriendo sin autenticar."
        .to_owned()
}

pub fn browser_error() -> String {
    "❌ Error configurando navegador".to_owned()
}

pub fn fatal(detail: &str) -> String {
    format!(
        "❌ <b>Error en monitor:</b>\n{}",
        util::truncate_chars(detail, FATAL_DETAIL_MAX),
    )
}

#[cfg(test)]
mod tests {
    use compact_str::CompactString;

    use super::{FATAL_DETAIL_MAX, fatal, slot_alert};
    use crate::slots::{MatchSource, SlotMatch};

    #[test]
    fn alert_carries_label_count_and_link() {
        let slot = SlotMatch {
            label: CompactString::const_new("20:00 a 22:00"),
            occurrences: 2,
            context: None,
            source: MatchSource::TextPattern,
        };
        let text = slot_alert(&slot, "https://tuclub.com/reservas");

        assert!(text.contains("20:00 a 22:00"));
        assert!(text.contains("x2"));
        assert!(text.contains("https://tuclub.com/reservas"));
        assert!(text.contains("<b>"));
    }

    #[test]
    fn fatal_detail_is_bounded() {
        let detail = "ñ".repeat(500);
        let text = fatal(&detail);

        assert!(text.starts_with("❌"));
        assert!(text.chars().filter(|&c| c == 'ñ').count() == FATAL_DETAIL_MAX);
    }

    #[test]
    fn short_fatal_detail_is_kept_whole() {
        assert!(fatal("browser died").contains("browser died"));
    }
}
