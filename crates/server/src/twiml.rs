use ringline_core::TenantConfig;
use tera::{Context, Tera};
use tracing::warn;

const VOICE: &str = "alice";
const DEFAULT_THANKS: &str = "Thank you. We will review your message and call you back.";

/// Formatting context for prompt templates: settings merged with
/// repair_scope, every key duplicated in UPPERCASE to match the
/// `{{STORE_NAME}}` template style.
fn build_context(config: &TenantConfig) -> Context {
    let mut context = Context::new();
    let mut insert_both = |key: &str, value: &str| {
        context.insert(key, value);
        context.insert(key.to_uppercase(), value);
    };

    for (key, value) in &config.settings {
        insert_both(key, value);
    }
    for (key, value) in &config.repair_scope {
        insert_both(key, value);
    }
    if !config.settings.contains_key("store_name") {
        insert_both("store_name", "");
    }
    if !config.settings.contains_key("address_line") {
        insert_both("address_line", "");
    }
    context
}

fn render_prompt(config: &TenantConfig, key: &str) -> String {
    render_prompt_with(config, key, &[])
}

fn render_prompt_with(config: &TenantConfig, key: &str, extra: &[(&str, &str)]) -> String {
    let text = config.prompt(key).unwrap_or("");
    if text.is_empty() {
        return String::new();
    }

    let mut context = build_context(config);
    for (extra_key, value) in extra {
        context.insert(*extra_key, value);
        context.insert(extra_key.to_uppercase(), value);
    }

    match Tera::one_off(text, &context, false) {
        Ok(rendered) => rendered,
        Err(err) => {
            warn!(prompt = %key, error = %err, "prompt failed to render, using raw text");
            text.to_owned()
        }
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

struct TwimlBuilder {
    xml: String,
}

impl TwimlBuilder {
    fn new() -> Self {
        Self { xml: String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>") }
    }

    fn say(mut self, text: &str) -> Self {
        self.xml.push_str(&format!("<Say voice=\"{VOICE}\">{}</Say>", escape_xml(text)));
        self
    }

    fn record(mut self, max_length_secs: u32) -> Self {
        self.xml.push_str(&format!(
            "<Record maxLength=\"{max_length_secs}\" timeout=\"5\" playBeep=\"true\" \
             trim=\"trim-silence\" recordingStatusCallback=\"/voice/recording-status\" \
             recordingStatusCallbackMethod=\"POST\" action=\"/voice/recorded-thank-you\"/>"
        ));
        self
    }

    fn gather_menu(mut self, menu_prompt: &str) -> Self {
        self.xml.push_str(&format!(
            "<Gather numDigits=\"1\" timeout=\"6\" action=\"/voice/menu\" method=\"POST\">\
             <Say voice=\"{VOICE}\">{}</Say></Gather>",
            escape_xml(menu_prompt)
        ));
        self
    }

    fn redirect(mut self, target: &str) -> Self {
        self.xml.push_str(&format!("<Redirect>{}</Redirect>", escape_xml(target)));
        self
    }

    fn hangup(mut self) -> Self {
        self.xml.push_str("<Hangup/>");
        self
    }

    fn finish(mut self) -> String {
        self.xml.push_str("</Response>");
        self.xml
    }
}

/// Main menu when open; voicemail or hangup per `off_mode` when closed.
pub fn incoming_response(config: &TenantConfig, open: bool) -> String {
    if !open {
        let off_mode = config.setting("off_mode").unwrap_or("voicemail");
        if off_mode == "voicemail" {
            return TwimlBuilder::new()
                .say(&render_prompt(config, "off_voicemail_prompt"))
                .record(60)
                .finish();
        }
        return TwimlBuilder::new()
            .say(&render_prompt(config, "off_hangup_prompt"))
            .hangup()
            .finish();
    }

    let intro = format!(
        "{} {}",
        render_prompt(config, "main_intro"),
        render_prompt(config, "main_scope")
    );

    TwimlBuilder::new()
        .say(&intro)
        .gather_menu(&render_prompt(config, "menu_prompt"))
        .redirect("/voice/no-input")
        .finish()
}

/// Digit 1 records a repair inquiry, 2 an accessory inquiry, 3 speaks the
/// opening hours, anything else is rejected politely.
pub fn menu_response(config: &TenantConfig, digit: &str) -> String {
    match digit {
        "1" => TwimlBuilder::new()
            .say(&render_prompt(config, "repair_prompt"))
            .record(120)
            .finish(),
        "2" => TwimlBuilder::new()
            .say(&render_prompt(config, "accessory_prompt"))
            .record(90)
            .finish(),
        "3" => {
            let hours = config.setting("hours_text").unwrap_or("");
            TwimlBuilder::new()
                .say(&render_prompt_with(config, "hours_prompt", &[("hours", hours)]))
                .hangup()
                .finish()
        }
        _ => TwimlBuilder::new()
            .say(&render_prompt(config, "invalid_prompt"))
            .hangup()
            .finish(),
    }
}

pub fn no_input_response(config: &TenantConfig) -> String {
    TwimlBuilder::new().say(&render_prompt(config, "no_input_prompt")).hangup().finish()
}

pub fn thank_you_response(config: &TenantConfig) -> String {
    let rendered = render_prompt(config, "after_record_thanks");
    let text = if rendered.is_empty() { DEFAULT_THANKS } else { rendered.as_str() };
    TwimlBuilder::new().say(text).hangup().finish()
}
