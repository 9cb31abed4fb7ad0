use scopeguard::ScopeGuard;

use std::io::{self, Write};

use log::*;

use crate::normalize::normalize;
use crate::reconcile::{plan, EntitySpan, MarkupStyle, SummaryRow};
use crate::status::ModelHolder;
use crate::Error;

/// What one submission produced, ready to be shown.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Found(Found),
    NoEntities { cleaned: String },
    Warning(String),
    Failed(String),
    Offline(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Found {
    pub cleaned: String,
    pub spans: Vec<EntitySpan>,
    pub rows: Vec<SummaryRow>,
    pub html: String,
    pub plain: String,
}

impl Outcome {
    pub fn message(&self) -> String {
        match self {
            Outcome::Found(found) => format!("Found {} entities:", found.rows.len()),
            Outcome::NoEntities { .. } => "No location entities found in the text.".to_string(),
            Outcome::Warning(message) | Outcome::Failed(message) | Outcome::Offline(message) => message.clone(),
        }
    }
}

pub trait Progress {
    fn start(&mut self, message: &str);
    fn finish(&mut self, message: &str);
    /// Remove the indicator without reporting completion.
    fn clear(&mut self);
}

/// Progress line on stderr.
pub struct ConsoleProgress;

impl Progress for ConsoleProgress {
    fn start(&mut self, message: &str) {
        eprint!("{}", message);
        let _ = io::stderr().flush();
    }

    fn finish(&mut self, message: &str) {
        eprintln!("\r\x1b[K{}", message);
    }

    fn clear(&mut self) {
        eprint!("\r\x1b[K");
        let _ = io::stderr().flush();
    }
}

/// Handle one submission end to end.
///
/// Every failure becomes an `Outcome`; nothing here is fatal.
pub fn extract(holder: &ModelHolder, input: &str, progress: &mut dyn Progress) -> Outcome {
    if let Err(e) = holder.load() {
        return Outcome::Offline(format!(
            "The model is not ready ({}). Try again or contact the administrator.",
            e
        ));
    }
    if input.trim().is_empty() {
        warn!("{}", Error::EmptyInput);
        return Outcome::Warning("Please enter some text first.".to_string());
    }

    let cleaned = normalize(input);
    debug!("Cleaned input: {:?}", cleaned);
    if cleaned.is_empty() {
        return Outcome::NoEntities { cleaned };
    }

    progress.start("Processing...");
    let progress = scopeguard::guard(progress, |progress| progress.clear());

    match tag(holder, &cleaned) {
        Ok(found) => {
            ScopeGuard::into_inner(progress).finish("Done!");
            if found.spans.is_empty() {
                Outcome::NoEntities { cleaned }
            } else {
                info!("Found {} entities", found.spans.len());
                Outcome::Found(found)
            }
        }
        Err(e) => {
            error!("Extraction failed: {}", e);
            Outcome::Failed(format!("Something went wrong while processing: {}", e))
        }
    }
}

fn tag(holder: &ModelHolder, cleaned: &str) -> Result<Found, Error> {
    let spans = holder.with_model(|model| model.classify(cleaned))??;
    for span in &spans {
        trace!("{:?}", span);
    }
    let highlights = plan(cleaned, &spans).map_err(|e| Error::InferenceFailure(e.to_string()))?;
    let html = highlights.render(MarkupStyle::Html);
    let plain = highlights.render(MarkupStyle::Plain);
    let rows = highlights.rows;
    Ok(Found {
        cleaned: cleaned.to_string(),
        spans,
        rows,
        html,
        plain,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enti::Classify;
    use crate::status::tests::FakeModel;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl Progress for Recorder {
        fn start(&mut self, message: &str) {
            self.events.push(format!("start {}", message));
        }
        fn finish(&mut self, message: &str) {
            self.events.push(format!("finish {}", message));
        }
        fn clear(&mut self) {
            self.events.push("clear".to_string());
        }
    }

    struct Broken;

    impl Classify for Broken {
        fn classify(&self, _text: &str) -> Result<Vec<EntitySpan>, Error> {
            Err(Error::InferenceFailure("CUDA out of memory".to_string()))
        }
    }

    struct OutOfRange;

    impl Classify for OutOfRange {
        fn classify(&self, text: &str) -> Result<Vec<EntitySpan>, Error> {
            Ok(vec![EntitySpan {
                start: 0,
                end: text.chars().count() + 3,
                label: "LOC".to_string(),
                score: 0.5,
                surface: text.to_string(),
            }])
        }
    }

    struct Nested;

    impl Classify for Nested {
        fn classify(&self, _text: &str) -> Result<Vec<EntitySpan>, Error> {
            let span = |start, end, label: &str, surface: &str| EntitySpan {
                start,
                end,
                label: label.to_string(),
                score: 0.8,
                surface: surface.to_string(),
            };
            Ok(vec![
                span(10, 14, "KAB", "pati"),
                span(10, 20, "LOC", "pati barat"),
                span(10, 10, "LOC", ""),
            ])
        }
    }

    fn holder_with(word: &'static str) -> ModelHolder<'static> {
        ModelHolder::new(move || Ok(Box::new(FakeModel { word }) as Box<dyn Classify>))
    }

    #[test]
    fn finds_locations() {
        let holder = holder_with("demak");
        let mut progress = Recorder::default();
        let outcome = extract(
            &holder,
            "Jalan rusak di Desa Karanganyar Kabupaten DEMAK sangat parah... https://t.co/x",
            &mut progress,
        );
        match &outcome {
            Outcome::Found(found) => {
                assert_eq!(
                    found.cleaned,
                    "jalan rusak di desa karanganyar kabupaten demak sangat parah..."
                );
                assert_eq!(found.rows.len(), 1);
                assert_eq!(found.rows[0].score, "90.00%");
                assert_eq!(
                    found.plain,
                    "jalan rusak di desa karanganyar kabupaten [demak]{LOC} sangat parah..."
                );
                assert!(found.html.contains("[LOC]</span></span> sangat"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(outcome.message(), "Found 1 entities:");
        assert_eq!(progress.events, ["start Processing...", "finish Done!"]);
    }

    #[test]
    fn nothing_found() {
        let holder = holder_with("semarang");
        let mut progress = Recorder::default();
        let outcome = extract(&holder, "Jalan rusak di Demak", &mut progress);
        assert_eq!(
            outcome,
            Outcome::NoEntities {
                cleaned: "jalan rusak di demak".to_string()
            }
        );
        assert_eq!(progress.events, ["start Processing...", "finish Done!"]);
    }

    #[test]
    fn empty_input_warns() {
        let holder = holder_with("demak");
        let mut progress = Recorder::default();
        assert!(matches!(extract(&holder, "", &mut progress), Outcome::Warning(_)));
        assert!(matches!(extract(&holder, " \n ", &mut progress), Outcome::Warning(_)));
        assert!(progress.events.is_empty());
    }

    #[test]
    fn only_noise_skips_model() {
        let holder = holder_with("demak");
        let mut progress = Recorder::default();
        let outcome = extract(&holder, "https://x.co @gov #jateng", &mut progress);
        assert_eq!(outcome, Outcome::NoEntities { cleaned: String::new() });
        assert!(progress.events.is_empty());
    }

    #[test]
    fn offline_model() {
        let holder = ModelHolder::new(|| Err(Error::ModelUnavailable("401 Unauthorized".to_string())));
        let mut progress = Recorder::default();
        match extract(&holder, "banjir di pati", &mut progress) {
            Outcome::Offline(message) => assert!(message.contains("401 Unauthorized")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(progress.events.is_empty());
        assert!(!holder.is_online());
    }

    #[test]
    fn inference_failure_clears_progress() {
        let holder = ModelHolder::new(|| Ok(Box::new(Broken) as Box<dyn Classify>));
        let mut progress = Recorder::default();
        match extract(&holder, "banjir di pati", &mut progress) {
            Outcome::Failed(message) => assert!(message.contains("CUDA out of memory")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(progress.events, ["start Processing...", "clear"]);
    }

    #[test]
    fn styles_share_one_reconciliation() {
        let holder = ModelHolder::new(|| Ok(Box::new(Nested) as Box<dyn Classify>));
        let mut progress = Recorder::default();
        match extract(&holder, "banjir di pati barat", &mut progress) {
            Outcome::Found(found) => {
                assert_eq!(found.rows.len(), 3);
                assert_eq!(found.plain, "banjir di [pati]{KAB} barat");
                assert!(found.html.starts_with("banjir di <span "));
                assert!(found.html.contains(">pati <span"));
                assert!(found.html.ends_with("[KAB]</span></span> barat"));
                assert!(!found.html.contains("[LOC]"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn bad_spans_are_a_failure() {
        let holder = ModelHolder::new(|| Ok(Box::new(OutOfRange) as Box<dyn Classify>));
        let mut progress = Recorder::default();
        assert!(matches!(
            extract(&holder, "banjir di pati", &mut progress),
            Outcome::Failed(_)
        ));
        assert_eq!(progress.events, ["start Processing...", "clear"]);
    }
}
