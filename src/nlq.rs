//! Natural-language questions answered from a [`MetricsSnapshot`].
//!
//! Classification is a port ([`IntentClassifier`]) so an embedding or LLM
//! backed classifier can replace [`KeywordClassifier`]. Rendering never
//! recomputes a metric: every number in an answer is a snapshot field.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::numeric::round2;
use crate::error::MetricsError;
use crate::metrics::MetricsSnapshot;
use crate::metrics::snapshot::NIGHT_USAGE_TARGET_PERCENT;

/// Below this confidence a short follow-up inherits the previous intent.
const CARRY_OVER_CONFIDENCE: f64 = 0.40;
/// Below this confidence the question is answered as unknown.
const MIN_CONFIDENCE: f64 = 0.35;
/// Follow-ups are at most this many words ("and the fridge?").
const FOLLOW_UP_WORDS: usize = 3;

/// What a question asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Billing,
    PreviousBill,
    UsageTotal,
    DeviceSpecific,
    HighestConsumer,
    LowestConsumer,
    Anomalies,
    SavingsReport,
    EfficiencyTips,
    Greeting,
    Unknown,
}

impl Intent {
    pub const ALL: [Intent; 11] = [
        Self::Billing,
        Self::PreviousBill,
        Self::UsageTotal,
        Self::DeviceSpecific,
        Self::HighestConsumer,
        Self::LowestConsumer,
        Self::Anomalies,
        Self::SavingsReport,
        Self::EfficiencyTips,
        Self::Greeting,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Billing => "billing",
            Self::PreviousBill => "previous_bill",
            Self::UsageTotal => "usage_total",
            Self::DeviceSpecific => "device_specific",
            Self::HighestConsumer => "highest_consumer",
            Self::LowestConsumer => "lowest_consumer",
            Self::Anomalies => "anomalies",
            Self::SavingsReport => "savings_report",
            Self::EfficiencyTips => "efficiency_tips",
            Self::Greeting => "greeting",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = MetricsError;

    /// Case-insensitive, so `"BILLING"` and `"billing"` both parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|i| i.as_str() == wanted)
            .ok_or_else(|| MetricsError::InvalidArgument(format!("unknown intent: {s}")))
    }
}

/// A classifier's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub intent: Intent,
    /// Score in `[0, 1]`.
    pub confidence: f64,
}

/// Maps a question to an intent.
pub trait IntentClassifier: Send + Sync {
    fn classify(&self, question: &str) -> Classification;
}

/// Keyword phrases per intent. Earlier rows win ties.
const KEYWORDS: &[(Intent, &[&str])] = &[
    (Intent::Greeting, &["hi", "hello", "hey", "who are you", "start"]),
    (
        Intent::PreviousBill,
        &[
            "last bill",
            "previous bill",
            "last month bill",
            "last months bill",
            "previous period bill",
        ],
    ),
    (
        Intent::EfficiencyTips,
        &[
            "tips",
            "tip",
            "save more",
            "reduce",
            "efficiency",
            "efficient",
            "wastage",
            "lower my bill",
        ],
    ),
    (
        Intent::SavingsReport,
        &[
            "save",
            "saved",
            "savings",
            "saving",
            "compared",
            "comparison",
            "last month",
            "net change",
        ],
    ),
    (
        Intent::Anomalies,
        &[
            "alert",
            "alerts",
            "anomaly",
            "anomalies",
            "unusual",
            "safe",
            "spike",
            "spikes",
            "why is it high",
        ],
    ),
    (
        Intent::HighestConsumer,
        &["most", "highest", "top", "dominant", "biggest", "main consumer", "expensive"],
    ),
    (Intent::LowestConsumer, &["least", "lowest", "smallest", "minimum"]),
    (
        Intent::Billing,
        &["bill", "owe", "cost", "charges", "price", "rupees", "pay", "monthly bill"],
    ),
    (
        Intent::UsageTotal,
        &["total", "consumption", "usage", "energy", "overall", "how much power"],
    ),
    (Intent::DeviceSpecific, &["device", "appliance", "specific device"]),
];

/// Scores each intent by the words of its phrases found in the question.
///
/// Multi-word phrases weigh more than single words, so "last bill" beats
/// "bill".
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl IntentClassifier for KeywordClassifier {
    fn classify(&self, question: &str) -> Classification {
        let normalized = normalize(question);
        let mut best = (Intent::Unknown, 0usize);
        for (intent, phrases) in KEYWORDS {
            let score: usize = phrases
                .iter()
                .filter(|p| contains_phrase(&normalized, p))
                .map(|p| p.split_whitespace().count())
                .sum();
            if score > best.1 {
                best = (*intent, score);
            }
        }

        let confidence = match best.1 {
            0 => 0.0,
            n => (0.45 + 0.15 * n as f64).min(0.95),
        };
        Classification {
            intent: best.0,
            confidence,
        }
    }
}

/// Aliases recognized as device names, mapped to the dataset's names.
const DEVICE_ALIASES: &[(&str, &str)] = &[
    ("air conditioner", "Air Conditioner"),
    ("ac", "Air Conditioner"),
    ("cooling", "Air Conditioner"),
    ("fridge", "Refrigerator"),
    ("refrigerator", "Refrigerator"),
    ("washing machine", "Washing Machine"),
    ("washer", "Washing Machine"),
    ("laundry", "Washing Machine"),
    ("light", "Lighting"),
    ("lights", "Lighting"),
    ("lighting", "Lighting"),
    ("tv", "Electronics"),
    ("computer", "Electronics"),
    ("electronics", "Electronics"),
];

/// Lowercases and reduces the question to space-separated words, padded so
/// phrase lookups match whole words only.
fn normalize(question: &str) -> String {
    let words: Vec<String> = question
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    format!(" {} ", words.join(" "))
}

fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    normalized.contains(&format!(" {phrase} "))
}

/// Returns the dataset device name the question mentions, preferring the
/// longest matching alias.
pub fn extract_entity(question: &str) -> Option<&'static str> {
    let normalized = normalize(question);
    DEVICE_ALIASES
        .iter()
        .filter(|(alias, _)| contains_phrase(&normalized, alias))
        .max_by_key(|(alias, _)| alias.len())
        .map(|(_, name)| *name)
}

/// Reply to one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub intent: Intent,
    pub confidence: f64,
    /// Device the question referred to, if any.
    pub entity: Option<String>,
}

/// Classifies questions and renders answers from snapshot fields.
#[derive(Clone)]
pub struct NlQueryBridge {
    classifier: Arc<dyn IntentClassifier>,
}

impl Default for NlQueryBridge {
    fn default() -> Self {
        Self::new(Arc::new(KeywordClassifier))
    }
}

impl fmt::Debug for NlQueryBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NlQueryBridge").finish_non_exhaustive()
    }
}

impl NlQueryBridge {
    pub fn new(classifier: Arc<dyn IntentClassifier>) -> Self {
        Self { classifier }
    }

    /// Answers `question`.
    ///
    /// A recognized device forces [`Intent::DeviceSpecific`]. A short
    /// follow-up the classifier is unsure about reuses `previous_intent`.
    /// Anything still under the minimum confidence is [`Intent::Unknown`].
    pub fn answer(
        &self,
        question: &str,
        snapshot: &MetricsSnapshot,
        anomaly_count: usize,
        previous_intent: Option<Intent>,
    ) -> Answer {
        let entity = extract_entity(question);
        let Classification {
            mut intent,
            mut confidence,
        } = self.classifier.classify(question);

        if entity.is_some() {
            intent = Intent::DeviceSpecific;
            confidence = 1.0;
        } else if confidence < CARRY_OVER_CONFIDENCE
            && question.split_whitespace().count() <= FOLLOW_UP_WORDS
        {
            if let Some(previous) = previous_intent.filter(|p| *p != Intent::Unknown) {
                intent = previous;
                confidence = 0.85;
            }
        }
        debug!(question, %intent, confidence, ?entity, "question classified");

        let answer = if confidence < MIN_CONFIDENCE {
            intent = Intent::Unknown;
            "I couldn't confidently map that question to your energy data. \
             Try asking 'What is my bill?' or 'Did I save money?'."
                .to_string()
        } else {
            render(intent, snapshot, anomaly_count, entity)
        };

        Answer {
            answer,
            intent,
            confidence: round2(confidence),
            entity: entity.map(str::to_string),
        }
    }
}

fn period_days(snapshot: &MetricsSnapshot) -> i64 {
    snapshot
        .current_period
        .map(|p| (p.end - p.start).num_days())
        .unwrap_or(30)
}

fn render(
    intent: Intent,
    s: &MetricsSnapshot,
    anomaly_count: usize,
    entity: Option<&str>,
) -> String {
    let days = period_days(s);
    let cur = &s.currency;

    if s.anchor.is_none() && intent != Intent::Greeting {
        return "No readings are available yet. Ask again once data has been loaded.".to_string();
    }

    match intent {
        Intent::Billing => format!(
            "Based on your consumption of {:.2} kWh over the last {days} days, \
             your estimated bill is {:.2} {cur}.",
            s.total_energy_kwh, s.current_bill
        ),
        Intent::PreviousBill => format!(
            "Your bill for the previous {days}-day period was {:.2} {cur} for {:.2} kWh.",
            s.previous_bill, s.previous_total_kwh
        ),
        Intent::UsageTotal => format!(
            "Your total load for the last {days} days is {:.2} kWh across {} devices.",
            s.total_energy_kwh, s.active_device_count
        ),
        Intent::DeviceSpecific => match entity {
            Some(name) => match s.device_energy(name) {
                Some((device, kwh)) => format!(
                    "The {device} consumed {kwh:.2} kWh in the last {days} days, \
                     about {:.1}% of your total usage.",
                    s.share_percent(kwh)
                ),
                None => format!(
                    "I recognized '{name}', but there is no data for it \
                     in the current {days}-day period."
                ),
            },
            None => "Which device would you like to know about? \
                     For example: 'How much does the AC use?'"
                .to_string(),
        },
        Intent::HighestConsumer => match s.dominant_device() {
            Some((device, kwh)) => format!(
                "The {device} is your highest consumer, using {kwh:.2} kWh ({:.1}% of total).",
                s.share_percent(kwh)
            ),
            None => "No device has recorded usage in the current period.".to_string(),
        },
        Intent::LowestConsumer => match s.least_device() {
            Some((device, kwh)) => format!(
                "The {device} is your lowest consumer, using only {kwh:.2} kWh ({:.1}% of total).",
                s.share_percent(kwh)
            ),
            None => "No device has recorded usage in the current period.".to_string(),
        },
        Intent::SavingsReport => {
            if s.savings_amount > 0.0 {
                format!(
                    "Good news! You saved about {:.2} {cur} compared to the previous period \
                     (consumption dropped by {:.2} kWh).",
                    s.savings_amount,
                    s.delta_kwh.abs()
                )
            } else if s.delta_kwh > 0.0 {
                format!(
                    "Your consumption increased by {:.2} kWh compared to the previous period. \
                     No savings this cycle.",
                    s.delta_kwh
                )
            } else {
                "Your consumption is unchanged from the previous period.".to_string()
            }
        }
        Intent::EfficiencyTips => {
            let mut text = format!(
                "Your night-time usage is {:.1}%. Lowering it below {:.0}% could save you \
                 roughly {:.0} {cur} next month.",
                s.night_usage_percent,
                NIGHT_USAGE_TARGET_PERCENT,
                s.night_shift_savings()
            );
            if let Some(driver) = s.primary_driver.as_ref().filter(|d| d.delta_kwh > 0.0) {
                text.push_str(&format!(
                    " The {} added {:.2} kWh since the previous period; start there.",
                    driver.device, driver.delta_kwh
                ));
            }
            text
        }
        Intent::Anomalies => match anomaly_count {
            0 => "No anomalies detected in the current period.".to_string(),
            1 => "1 anomaly detected in the current period. \
                  Check the anomalies list for details."
                .to_string(),
            n => format!(
                "{n} anomalies detected in the current period. \
                 Check the anomalies list for details."
            ),
        },
        Intent::Greeting => format!(
            "Hello. I have your last {days} days of energy metrics. \
             Ask me about your bill, savings, or specific devices."
        ),
        Intent::Unknown => {
            "I'm not sure about that. Try asking about your bill, savings, highest load, \
             or a device like the AC."
                .to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{Duration, NaiveDate};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::metrics::{Periods, PrimaryDriver};

    fn snapshot() -> MetricsSnapshot {
        let anchor = NaiveDate::from_ymd_opt(2025, 12, 31)
            .and_then(|d| d.and_hms_opt(23, 0, 0))
            .unwrap();
        let periods = Periods::anchored(anchor, 30);
        let mut s = MetricsSnapshot::zero("INR");
        s.device_wise_energy_kwh = BTreeMap::from([
            ("Air Conditioner".to_string(), 150.0),
            ("Refrigerator".to_string(), 40.0),
            ("Lighting".to_string(), 10.0),
        ]);
        s.total_energy_kwh = 200.0;
        s.active_device_count = 3;
        s.current_bill = 800.0;
        s.previous_bill = 1000.0;
        s.savings_amount = 200.0;
        s.previous_total_kwh = 225.0;
        s.delta_kwh = -25.0;
        s.night_usage_percent = 35.5;
        s.anchor = Some(anchor);
        s.current_period = Some(periods.current);
        s.previous_period = Some(periods.previous);
        s
    }

    fn ask(question: &str, previous: Option<Intent>) -> Answer {
        NlQueryBridge::default().answer(question, &snapshot(), 2, previous)
    }

    #[test]
    fn classifies_common_questions() {
        let cases = [
            ("What is my bill?", Intent::Billing),
            ("What was my last bill?", Intent::PreviousBill),
            ("Did I save money?", Intent::SavingsReport),
            ("How can I save more?", Intent::EfficiencyTips),
            ("What uses the most power?", Intent::HighestConsumer),
            ("Which appliance uses the least?", Intent::LowestConsumer),
            ("Any alerts?", Intent::Anomalies),
            ("Total consumption please", Intent::UsageTotal),
            ("Hello", Intent::Greeting),
        ];
        for (question, expected) in cases {
            assert_eq!(KeywordClassifier.classify(question).intent, expected, "{question}");
        }
    }

    #[test]
    fn billing_answer_uses_snapshot_numbers() {
        let a = ask("What is my bill?", None);
        assert_eq!(a.intent, Intent::Billing);
        assert!(a.answer.contains("200.00 kWh"), "{}", a.answer);
        assert!(a.answer.contains("800.00 INR"), "{}", a.answer);
        assert!(a.answer.contains("30 days"), "{}", a.answer);
    }

    #[test]
    fn device_alias_forces_device_intent() {
        let a = ask("what is my AC bill", None);
        assert_eq!(a.intent, Intent::DeviceSpecific);
        assert_eq!(a.entity.as_deref(), Some("Air Conditioner"));
        assert_eq!(a.confidence, 1.0);
        assert!(a.answer.contains("150.00 kWh"), "{}", a.answer);
        assert!(a.answer.contains("75.0%"), "{}", a.answer);
    }

    #[test]
    fn washing_machine_is_not_mistaken_for_ac() {
        assert_eq!(extract_entity("washing machine usage"), Some("Washing Machine"));
        assert_eq!(extract_entity("Tell me about the fridge."), Some("Refrigerator"));
        assert_eq!(extract_entity("how is the machine"), None);
    }

    #[test]
    fn recognized_device_without_data() {
        let a = ask("How much does the TV use?", None);
        assert_eq!(a.entity.as_deref(), Some("Electronics"));
        assert!(a.answer.contains("no data"), "{}", a.answer);
    }

    #[test]
    fn short_follow_up_inherits_previous_intent() {
        let a = ask("and now?", Some(Intent::SavingsReport));
        assert_eq!(a.intent, Intent::SavingsReport);
        assert_eq!(a.confidence, 0.85);
        assert!(a.answer.contains("saved about 200.00 INR"), "{}", a.answer);
    }

    #[test]
    fn long_unclear_question_is_unknown() {
        let a = ask("tell me something interesting about the weather", Some(Intent::Billing));
        assert_eq!(a.intent, Intent::Unknown);
        assert!(a.confidence < 0.35);
    }

    #[test]
    fn anomaly_count_is_reported() {
        let a = ask("Any anomalies?", None);
        assert!(a.answer.starts_with("2 anomalies"), "{}", a.answer);
    }

    #[test]
    fn extremes_come_from_snapshot_helpers() {
        assert!(ask("Which is the highest?", None).answer.contains("Air Conditioner"));
        assert!(ask("Which is the lowest?", None).answer.contains("Lighting"));
    }

    #[test]
    fn tips_mention_positive_driver() {
        let mut s = snapshot();
        s.primary_driver = Some(PrimaryDriver {
            device: "Refrigerator".into(),
            delta_kwh: 12.5,
            current_kwh: 40.0,
            previous_kwh: 27.5,
        });
        let a = NlQueryBridge::default().answer("tips to reduce my bill", &s, 0, None);
        assert_eq!(a.intent, Intent::EfficiencyTips);
        assert!(a.answer.contains("35.5%"), "{}", a.answer);
        assert!(
            a.answer.contains("below 20% could save you roughly 120 INR"),
            "{}",
            a.answer
        );
        assert!(a.answer.contains("Refrigerator added 12.50 kWh"), "{}", a.answer);
    }

    #[test]
    fn empty_snapshot_answers_without_numbers() {
        let zero = MetricsSnapshot::zero("INR");
        let a = NlQueryBridge::default().answer("What is my bill?", &zero, 0, None);
        assert_eq!(a.intent, Intent::Billing);
        assert!(a.answer.starts_with("No readings"), "{}", a.answer);
    }

    #[test]
    fn intent_parses_case_insensitively() {
        assert_eq!("BILLING".parse::<Intent>().ok(), Some(Intent::Billing));
        assert_eq!("savings_report".parse::<Intent>().ok(), Some(Intent::SavingsReport));
        assert!("weather".parse::<Intent>().is_err());
    }

    #[test]
    fn period_length_follows_snapshot() {
        let mut s = snapshot();
        if let (Some(anchor), Some(p)) = (s.anchor, s.current_period.as_mut()) {
            p.start = anchor - Duration::days(14);
        }
        let a = NlQueryBridge::default().answer("total usage", &s, 0, None);
        assert!(a.answer.contains("last 14 days"), "{}", a.answer);
    }
}
