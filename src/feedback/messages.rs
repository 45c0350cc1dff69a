//! User-facing feedback text (pt-PT).

use crate::intent::IntentEvent;
use crate::session::ContextRequirement;

pub const NOTHING_TO_CONFIRM: &str =
    "Não tenho a certeza do que estás a confirmar. Podes repetir o teu pedido?";
pub const NOTHING_TO_CANCEL: &str = "Está bem";
pub const CANCELLED: &str = "Cancelado. O que queres fazer em vez disso?";
pub const GENERIC_FAILURE: &str = "Desculpa, ocorreu um erro";
pub const PROCESSING_FAILURE: &str = "Ocorreu um erro ao processar o teu pedido";
pub const LOWER_CERTAINTY_PREFIX: &str = "Não tenho a certeza se percebi bem.";

/// Confirmation questions. `{a|b}` takes the first entity present among `a`, `b`.
const CONFIRMATION_TEMPLATES: &[(&str, &str)] = &[
    ("search_location", "Querias procurar {location|query}?"),
    ("find_place", "Querias procurar {location|query}?"),
    ("get_directions", "Devo obter direções para {destination|location}?"),
    ("start_navigation", "Devo iniciar a navegação?"),
    ("stop_navigation", "Querias parar a navegação?"),
    ("show_place_details", "Querias ver os detalhes do lugar?"),
    ("show_reviews", "Devo mostrar as avaliações?"),
    ("show_photos", "Querias ver as fotos?"),
    ("zoom_in", "Querias aumentar o zoom?"),
    ("zoom_out", "Querias diminuir o zoom?"),
    ("recenter_map", "Querias recentrar o mapa?"),
    ("center_location", "Querias centrar o mapa em {location|destination}?"),
    ("show_traffic", "Querias mostrar o trânsito?"),
    ("hide_traffic", "Querias esconder o trânsito?"),
    ("get_trip_duration", "Querias saber quanto tempo demora?"),
    ("get_trip_distance", "Querias saber a distância?"),
    ("change_transport_mode", "Querias mudar o meio de transporte?"),
    ("swap_route", "Querias inverter a rota?"),
    ("select_place", "Querias selecionar este lugar?"),
    ("select_alternative_route", "Querias usar uma rota alternativa?"),
    ("change_map_type", "Querias mudar o tipo de mapa?"),
    ("get_opening_hours", "Querias saber os horários?"),
    ("goodbye", "Querias desligar?"),
    ("cancel", "Querias cancelar?"),
    ("help", "Querias ajuda?"),
];

/// Question asked before executing `event`.
#[must_use]
pub fn confirmation_prompt(event: &IntentEvent, lower_certainty: bool) -> String {
    let question = CONFIRMATION_TEMPLATES
        .iter()
        .find(|(intent, _)| *intent == event.intent)
        .and_then(|(_, template)| render(template, event))
        .unwrap_or_else(|| format!("Querias {}?", event.intent.replace('_', " ")));
    if lower_certainty {
        format!("{LOWER_CERTAINTY_PREFIX} {question}")
    } else {
        question
    }
}

/// Spoken when a contextual command has nothing to act on.
#[must_use]
pub fn no_active_context(requirement: ContextRequirement) -> &'static str {
    match requirement {
        ContextRequirement::ResultSet => {
            "Ainda não há resultados para escolher. Faz primeiro uma pesquisa."
        }
        ContextRequirement::ActiveRoute => {
            "Não consigo ver direções ativas. Pede direções primeiro."
        }
        ContextRequirement::SelectedPlace => "Ainda não selecionaste nenhum lugar.",
    }
}

/// Fill `{name|alias}` placeholders from entity raw text; `None` if any is unresolved.
fn render(template: &str, event: &IntentEvent) -> Option<String> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}')?;
        let value = after[..close]
            .split('|')
            .find_map(|name| event.entity(name.trim()))
            .map(|entity| entity.raw_text.trim())
            .filter(|text| !text.is_empty())?;
        out.push_str(value);
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Some(out)
}
