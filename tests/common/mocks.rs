use std::sync::{Arc, Mutex};

use mockall::mock;

use xml_binder::{CharacterEscapeHandler, NamespacePrefixMapper};

mock! {
    pub PrefixMapper {}

    impl NamespacePrefixMapper for PrefixMapper {
        fn preferred_prefix(
            &self,
            namespace_uri: &str,
            suggestion: &str,
            require_prefix: bool,
        ) -> Option<String>;
    }
}

mock! {
    pub EscapeHandler {}

    impl CharacterEscapeHandler for EscapeHandler {
        fn escape(&self, text: &str, is_attribute: bool, out: &mut String);
    }
}

/// Spans handed to an escape handler, with their attribute flag
pub type EscapeLog = Arc<Mutex<Vec<(String, bool)>>>;

/// Escape handler mock that copies spans through unchanged and records them
pub fn recording_escape_handler() -> (MockEscapeHandler, EscapeLog) {
    let log: EscapeLog = Arc::new(Mutex::new(Vec::new()));
    let mut handler = MockEscapeHandler::new();

    let recorded = Arc::clone(&log);
    handler
        .expect_escape()
        .returning(move |text, is_attribute, out| {
            recorded
                .lock()
                .unwrap()
                .push((text.to_string(), is_attribute));
            out.push_str(text);
        });

    (handler, log)
}
