use std::time::Duration;
use tracing::debug;

/// Delay before an offline answer, so replies don't appear to be instant.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(800);

struct Topic {
  name: &'static str,
  keywords: &'static [&'static str],
  answer: &'static str,
}

const TOPICS: &[Topic] = &[
  Topic {
    name: "greeting",
    keywords: &["hello", "hi", "hey", "howdy"],
    answer: "Hi! I'm Olive. Ask me about housing, roommates, leases, or budgeting for student life.",
  },
  Topic {
    name: "roommate",
    keywords: &["roommate", "roomate", "flatmate", "housemate"],
    answer: "When looking for a roommate, agree early on rent split, guests, quiet hours, and cleaning. \
             Posting in the community feed is a good way to find people from your university.",
  },
  Topic {
    name: "lease",
    keywords: &["lease", "contract", "sublet", "sublease"],
    answer: "Read the whole lease before signing: check the term, renewal and break clauses, \
             and who pays for repairs. Ask for any verbal promises in writing.",
  },
  Topic {
    name: "rent",
    keywords: &["rent", "deposit", "landlord"],
    answer: "Deposits are usually one month's rent. Get a receipt for every payment and \
             photograph the unit at move-in so the deposit comes back in full.",
  },
  Topic {
    name: "budget",
    keywords: &["budget", "afford", "cost", "money", "cheap"],
    answer: "A common rule is to keep rent under a third of your monthly budget. \
             Remember utilities, internet, and transit when comparing listings.",
  },
  Topic {
    name: "safety",
    keywords: &["safe", "safety", "scam", "secure"],
    answer: "Never wire money before seeing a place in person or on a live video call. \
             Check that the landlord actually owns the property and meet in public first.",
  },
  Topic {
    name: "commute",
    keywords: &["commute", "bus", "transit", "distance", "walk", "bike"],
    answer: "Check the bus schedule at the times you'd actually travel. A cheaper place \
             farther out can cost more once you add transit and time.",
  },
  Topic {
    name: "housing",
    keywords: &["housing", "apartment", "room", "studio", "house", "place", "listing"],
    answer: "Browse the housing section to filter listings by price, bedrooms, and city. \
             Liking a listing saves it so you can compare later.",
  },
];

const DEFAULT_ANSWER: &str = "I'm offline right now, but I can still help with housing, roommates, \
                              leases, rent, budgeting, safety, and commuting. Try asking about one of those.";

/// Canned keyword responder used when the assistant endpoint can't be reached.
#[derive(Debug, Clone)]
pub struct OfflineAssistant {
  delay: Duration,
}

impl Default for OfflineAssistant {
  fn default() -> Self {
    Self::new(DEFAULT_DELAY)
  }
}

impl OfflineAssistant {
  pub fn new(delay: Duration) -> Self {
    Self { delay }
  }

  /// Answer for the first topic whose keyword appears as a word in `prompt`.
  pub fn answer_for(&self, prompt: &str) -> &'static str {
    let words: Vec<String> = prompt
      .split(|c: char| !c.is_alphanumeric())
      .filter(|w| !w.is_empty())
      .map(str::to_lowercase)
      .collect();

    let matches = |keyword: &str| {
      words
        .iter()
        .any(|w| w == keyword || w.strip_suffix('s') == Some(keyword))
    };

    match TOPICS.iter().find(|t| t.keywords.iter().any(|&k| matches(k))) {
      Some(topic) => {
        debug!(topic = topic.name, "offline assistant matched topic");
        topic.answer
      }
      None => DEFAULT_ANSWER,
    }
  }

  pub async fn reply(&self, prompt: &str) -> String {
    tokio::time::sleep(self.delay).await;
    self.answer_for(prompt).to_string()
  }
}
