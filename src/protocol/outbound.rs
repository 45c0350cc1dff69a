//! Outbound feedback encodings for the speech synthesis peer.

use crate::config::FeedbackFormat;
use quick_xml::escape::escape;

/// Encode `text` for the peer in the configured format.
#[must_use]
pub fn encode(format: FeedbackFormat, text: &str, language: &str) -> String {
    match format {
        FeedbackFormat::Json => json_speak(text, language),
        FeedbackFormat::Mmi => mmi_speech_request(text, language),
    }
}

/// `{"text": ..., "language": ...}`
#[must_use]
pub fn json_speak(text: &str, language: &str) -> String {
    serde_json::json!({ "text": text, "language": language }).to_string()
}

/// MMI `startRequest` addressed to the interaction manager, carrying an SSML
/// document. The SSML is escaped once into the command text.
#[must_use]
pub fn mmi_speech_request(text: &str, language: &str) -> String {
    let language = escape(language);
    let ssml = format!(
        concat!(
            r#"<speak version="1.0" xmlns="http://www.w3.org/2001/10/synthesis" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" "#,
            r#"xsi:schemaLocation="http://www.w3.org/2001/10/synthesis http://www.w3.org/TR/speech-synthesis/synthesis.xsd" "#,
            r#"xml:lang="{lang}"><p>{text}</p></speak>"#
        ),
        lang = language,
        text = escape(text),
    );
    let request_id = uuid::Uuid::new_v4();
    format!(
        concat!(
            r#"<mmi:mmi xmlns:mmi="http://www.w3.org/2008/04/mmi-arch" mmi:version="1.0">"#,
            r#"<mmi:startRequest mmi:context="ctx-1" mmi:requestId="{request_id}" mmi:source="{source}" mmi:target="IM">"#,
            r#"<mmi:data><emma:emma xmlns:emma="http://www.w3.org/2003/04/emma" emma:version="1.0">"#,
            r#"<emma:interpretation emma:confidence="1" emma:id="text-" emma:medium="text" emma:mode="command" emma:start="0">"#,
            r#"<command>"{ssml}"</command>"#,
            r#"</emma:interpretation></emma:emma></mmi:data></mmi:startRequest></mmi:mmi>"#
        ),
        request_id = request_id,
        source = super::mmi::APP_SPEECH_SOURCE,
        ssml = escape(&ssml),
    )
}
