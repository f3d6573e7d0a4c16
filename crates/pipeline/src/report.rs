/// All fields of the finished report. Callers substitute placeholders before
/// composition; nothing here can fail.
#[derive(Clone, Debug)]
pub struct ReportContext<'a> {
    pub store_name: &'a str,
    pub from_number: &'a str,
    pub timestamp: &'a str,
    pub timezone: &'a str,
    pub menu_selection: &'a str,
    pub duration: &'a str,
    pub call_sid: &'a str,
    pub summary: &'a str,
    pub transcript: &'a str,
    pub recording_url: &'a str,
}

const SECTION_RULE: &str = "========================================";

pub fn subject(store_name: &str, menu_selection: &str, from_number: &str) -> String {
    format!("{store_name} Call | Menu {menu_selection} | {from_number} | recording")
}

/// Fixed section layout: call details, summary, transcript, recording link.
pub fn body(ctx: &ReportContext<'_>) -> String {
    format!(
        "New voicemail recording received.\n\
         \n\
         {SECTION_RULE}\n\
         CALL DETAILS\n\
         {SECTION_RULE}\n\
         Store: {store}\n\
         From: {from}\n\
         Time: {time} ({tz})\n\
         Menu: {menu}\n\
         Duration: {duration}s\n\
         Call SID: {call_sid}\n\
         \n\
         {SECTION_RULE}\n\
         SUMMARY\n\
         {SECTION_RULE}\n\
         {summary}\n\
         \n\
         {SECTION_RULE}\n\
         TRANSCRIPT\n\
         {SECTION_RULE}\n\
         {transcript}\n\
         \n\
         {SECTION_RULE}\n\
         RECORDING\n\
         {SECTION_RULE}\n\
         {url}\n",
        store = ctx.store_name,
        from = ctx.from_number,
        time = ctx.timestamp,
        tz = ctx.timezone,
        menu = ctx.menu_selection,
        duration = ctx.duration,
        call_sid = ctx.call_sid,
        summary = ctx.summary,
        transcript = ctx.transcript,
        url = ctx.recording_url,
    )
}

#[cfg(test)]
mod tests {
    use super::{body, subject, ReportContext};

    #[test]
    fn subject_line_uses_the_fixed_format() {
        assert_eq!(
            subject("Cannon Hill Phones", "repair", "+615550123"),
            "Cannon Hill Phones Call | Menu repair | +615550123 | recording"
        );
    }

    #[test]
    fn body_contains_every_section_in_order() {
        let rendered = body(&ReportContext {
            store_name: "Cannon Hill Phones",
            from_number: "+615550123",
            timestamp: "2026-08-24 10:15:00",
            timezone: "Australia/Brisbane",
            menu_selection: "repair",
            duration: "42",
            call_sid: "CA123",
            summary: "Customer asks about a cracked screen.",
            transcript: "Hi, my phone screen is cracked...",
            recording_url: "https://recordings.example/CA123",
        });

        let details = rendered.find("CALL DETAILS").expect("details section");
        let summary = rendered.find("SUMMARY").expect("summary section");
        let transcript = rendered.find("TRANSCRIPT").expect("transcript section");
        let recording = rendered.find("RECORDING\n").expect("recording section");
        assert!(details < summary && summary < transcript && transcript < recording);
        assert!(rendered.contains("Duration: 42s"));
        assert!(rendered.contains("Time: 2026-08-24 10:15:00 (Australia/Brisbane)"));
        assert!(rendered.contains("https://recordings.example/CA123"));
    }
}
