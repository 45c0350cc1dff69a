//! Inbound MMI envelope parsing.
//!
//! Recognizers reach the dispatcher through an interaction manager that wraps
//! every result in an `mmi:mmi` XML document. The interesting payload lives in
//! one or more `<command>` elements whose text is either JSON
//! (`{"recognized": ["SPEECH"], "nlu": ...}`) or a bracket pair
//! (`[GESTURES][SWIPELL]`). Speech results may also arrive bare, as the NLU
//! JSON object itself.

use crate::error::{DispatchError, Result};
use crate::intent::IntentSource;
use bytes::Bytes;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Deserialize;

/// Outbound speech requests carry this source; seeing it inbound means an echo.
pub const APP_SPEECH_SOURCE: &str = "APPSPEECH";
/// Speech-out target; messages addressed here are not for us.
pub const SPEECH_OUT_TARGET: &str = "SPEECHOUT";

/// Transport-level frames that carry no recognizer result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFrame {
    /// `OK` / `RENEW` keep-alives from the interaction manager.
    KeepAlive,
    /// `startResponse` acknowledgement of one of our requests.
    Acknowledgement,
    /// Our own speech output routed back to us.
    Echo,
}

/// A recognizer result, still in recognizer-specific terms.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRecord {
    pub source: IntentSource,
    /// NLU intent name, fused intent name, or gesture code.
    pub code: String,
    pub confidence: f32,
    /// `(entity, value)` pairs in wire order.
    pub entities: Vec<(String, String)>,
    pub utterance: Option<String>,
    /// MMI `Context` attribute, if present.
    pub context_id: Option<String>,
    pub raw: Bytes,
}

/// Parsed inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Control(ControlFrame),
    Record(WireRecord),
}

/// Parse one inbound message.
///
/// # Errors
///
/// Returns [`DispatchError::MalformedEnvelope`] when the message is neither a
/// control frame nor a recognizable recognizer result.
pub fn parse_envelope(raw: &str) -> Result<Envelope> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(malformed("empty message"));
    }
    if trimmed.eq_ignore_ascii_case("OK") || trimmed.eq_ignore_ascii_case("RENEW") {
        return Ok(Envelope::Control(ControlFrame::KeepAlive));
    }

    let raw_bytes = Bytes::copy_from_slice(raw.as_bytes());
    let candidate = match trimmed.as_bytes()[0] {
        b'<' => return parse_xml(trimmed, raw_bytes),
        b'{' | b'[' => parse_command_text(trimmed)?
            .ok_or_else(|| malformed("message carries no recognized result"))?,
        _ => return Err(malformed("unrecognized message framing")),
    };
    Ok(Envelope::Record(candidate.into_record(None, raw_bytes)))
}

fn malformed(reason: impl Into<String>) -> DispatchError {
    DispatchError::MalformedEnvelope(reason.into())
}

/// A result pulled out of one `<command>` (or a bare payload).
#[derive(Debug)]
struct Candidate {
    source: IntentSource,
    code: String,
    confidence: Option<f32>,
    entities: Vec<(String, String)>,
    utterance: Option<String>,
}

impl Candidate {
    fn into_record(self, context_id: Option<String>, raw: Bytes) -> WireRecord {
        WireRecord {
            source: self.source,
            code: self.code,
            // Gestures are discrete; NLU results without a score are taken as certain.
            confidence: self.confidence.unwrap_or(1.0),
            entities: self.entities,
            utterance: self.utterance,
            context_id,
            raw,
        }
    }
}

fn parse_xml(xml: &str, raw: Bytes) -> Result<Envelope> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut context_id: Option<String> = None;
    let mut in_command = false;
    let mut command_texts: Vec<String> = Vec::new();
    let mut current = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if let Some(frame) = inspect_element(&e, &mut context_id)? {
                    return Ok(Envelope::Control(frame));
                }
                if e.local_name().as_ref() == b"command" {
                    in_command = true;
                    current.clear();
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(frame) = inspect_element(&e, &mut context_id)? {
                    return Ok(Envelope::Control(frame));
                }
            }
            Ok(Event::Text(t)) if in_command => {
                let text = t
                    .unescape()
                    .map_err(|e| malformed(format!("bad command text: {e}")))?;
                current.push_str(&text);
            }
            Ok(Event::CData(c)) if in_command => {
                let text = std::str::from_utf8(c.as_ref())
                    .map_err(|e| malformed(format!("command CDATA is not UTF-8: {e}")))?;
                current.push_str(text);
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"command" && in_command {
                    in_command = false;
                    command_texts.push(std::mem::take(&mut current));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(malformed(format!(
                    "invalid XML at byte {}: {e}",
                    reader.error_position()
                )));
            }
        }
    }

    if command_texts.is_empty() {
        return Err(malformed("envelope carries no command"));
    }

    let mut chosen: Option<Candidate> = None;
    for text in &command_texts {
        let Some(candidate) = parse_command_text(text)? else {
            continue;
        };
        // A fused result overrides anything else in the same envelope;
        // otherwise the first modality result wins.
        match (&chosen, candidate.source) {
            (_, IntentSource::Fusion) => chosen = Some(candidate),
            (None, _) => chosen = Some(candidate),
            _ => {}
        }
    }

    let candidate = chosen.ok_or_else(|| malformed("no command carries a recognized result"))?;
    Ok(Envelope::Record(candidate.into_record(context_id, raw)))
}

/// Look at the element name and attributes for control markers and context.
fn inspect_element(
    element: &BytesStart<'_>,
    context_id: &mut Option<String>,
) -> Result<Option<ControlFrame>> {
    if element.local_name().as_ref() == b"startResponse" {
        return Ok(Some(ControlFrame::Acknowledgement));
    }
    for attr in element.attributes() {
        let attr = attr.map_err(|e| malformed(format!("bad attribute: {e}")))?;
        let key = attr.key.local_name();
        let key = key.as_ref();
        if key.eq_ignore_ascii_case(b"target") || key.eq_ignore_ascii_case(b"source") {
            let value = attr
                .unescape_value()
                .map_err(|e| malformed(format!("bad attribute value: {e}")))?;
            if value == SPEECH_OUT_TARGET || value == APP_SPEECH_SOURCE {
                return Ok(Some(ControlFrame::Echo));
            }
        } else if key.eq_ignore_ascii_case(b"context") && context_id.is_none() {
            let value = attr
                .unescape_value()
                .map_err(|e| malformed(format!("bad attribute value: {e}")))?;
            let value = value.trim();
            if !value.is_empty() {
                *context_id = Some(value.to_owned());
            }
        }
    }
    Ok(None)
}

/// `Ok(None)` for commands that carry no result (empty `recognized`).
fn parse_command_text(text: &str) -> Result<Option<Candidate>> {
    let text = text.trim();
    match text.as_bytes().first() {
        Some(b'{') => {
            let command: MmiCommand = serde_json::from_str(text)
                .map_err(|e| malformed(format!("command is not valid JSON: {e}")))?;
            if command.recognized.is_empty() && command.intent.is_some() {
                return parse_json_command(text).map(Some);
            }
            command.into_candidate()
        }
        Some(b'[') => parse_bracket_command(text).map(Some),
        _ => Err(malformed("command text is neither JSON nor a bracket pair")),
    }
}

/// JSON carried inside `<command>`.
#[derive(Debug, Deserialize)]
struct MmiCommand {
    #[serde(default)]
    recognized: Vec<String>,
    #[serde(default)]
    nlu: Option<serde_json::Value>,
    /// Present when the command holds a bare NLU result.
    #[serde(default)]
    intent: Option<serde_json::Value>,
}

impl MmiCommand {
    fn into_candidate(self) -> Result<Option<Candidate>> {
        let Some(modality) = self.recognized.first() else {
            return Ok(None);
        };
        let source = modality_source(modality)?;
        match source {
            IntentSource::Speech => {
                let nlu = match self.nlu {
                    Some(serde_json::Value::String(s)) => serde_json::from_str::<NluResult>(&s),
                    Some(value) => serde_json::from_value::<NluResult>(value),
                    None => return Err(malformed("speech command carries no nlu result")),
                }
                .map_err(|e| malformed(format!("invalid nlu result: {e}")))?;
                nlu.into_candidate().map(Some)
            }
            IntentSource::Gesture | IntentSource::Fusion => {
                let code = self
                    .recognized
                    .get(1)
                    .map(|c| c.trim())
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| malformed(format!("{modality} command carries no code")))?;
                Ok(Some(Candidate {
                    source,
                    code: code.to_owned(),
                    confidence: None,
                    entities: Vec::new(),
                    utterance: None,
                }))
            }
        }
    }
}

fn modality_source(modality: &str) -> Result<IntentSource> {
    match modality.trim().to_ascii_uppercase().as_str() {
        "SPEECH" => Ok(IntentSource::Speech),
        "GESTURES" | "GESTURE" => Ok(IntentSource::Gesture),
        "FUSION" => Ok(IntentSource::Fusion),
        other => Err(malformed(format!("unknown modality `{other}`"))),
    }
}

/// NLU classification result; `intent` is either a bare name or `{name, confidence}`.
#[derive(Debug, Deserialize)]
struct NluResult {
    intent: NluIntent,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    entities: Option<Vec<NluEntity>>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NluIntent {
    Name(String),
    Ranked {
        name: String,
        #[serde(default)]
        confidence: Option<f32>,
    },
}

#[derive(Debug, Deserialize)]
struct NluEntity {
    entity: String,
    #[serde(default)]
    value: serde_json::Value,
}

impl NluResult {
    fn into_candidate(self) -> Result<Candidate> {
        let (name, ranked_confidence) = match self.intent {
            NluIntent::Name(name) => (name, None),
            NluIntent::Ranked { name, confidence } => (name, confidence),
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(malformed("nlu result has an empty intent name"));
        }
        let entities = self
            .entities
            .unwrap_or_default()
            .into_iter()
            .filter_map(|e| {
                let value = match e.value {
                    serde_json::Value::Null => return None,
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                let entity = e.entity.trim();
                if entity.is_empty() || value.trim().is_empty() {
                    return None;
                }
                Some((entity.to_owned(), value))
            })
            .collect();
        Ok(Candidate {
            source: IntentSource::Speech,
            code: name.to_owned(),
            confidence: ranked_confidence.or(self.confidence),
            entities,
            utterance: self.text.filter(|t| !t.trim().is_empty()),
        })
    }
}

fn parse_json_command(text: &str) -> Result<Candidate> {
    let nlu: NluResult = serde_json::from_str(text)
        .map_err(|e| malformed(format!("invalid speech message: {e}")))?;
    nlu.into_candidate()
}

/// `[SOURCE][CODE]`, e.g. `[GESTURES][SWIPELL]`.
fn parse_bracket_command(text: &str) -> Result<Candidate> {
    let mut parts = Vec::new();
    let mut rest = text.trim();
    while let Some(open) = rest.strip_prefix('[') {
        let Some(close) = open.find(']') else {
            return Err(malformed("unterminated bracket field"));
        };
        parts.push(open[..close].trim());
        rest = open[close + 1..].trim_start();
    }
    if !rest.is_empty() || parts.len() < 2 {
        return Err(malformed(format!("expected [SOURCE][CODE], got `{text}`")));
    }
    let source = modality_source(parts[0])?;
    if source == IntentSource::Speech {
        return Err(malformed("bracket form is not used for speech results"));
    }
    let code = parts[1];
    if code.is_empty() {
        return Err(malformed("empty code in bracket pair"));
    }
    Ok(Candidate {
        source,
        code: code.to_owned(),
        confidence: None,
        entities: Vec::new(),
        utterance: None,
    })
}
