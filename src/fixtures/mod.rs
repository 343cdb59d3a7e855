//! Development data: random messages for a fresh store.

use rand::seq::IndexedRandom;
use rand::Rng;

use crate::message::{Message, MessageStatus};
use crate::store::{MessageStore, StoreError};

const WORDS: &[&str] = &[
    "alpha", "amber", "anchor", "apple", "arrow", "autumn", "basket", "beacon", "bridge", "canyon",
    "carbon", "cedar", "circle", "cloud", "copper", "coral", "delta", "desert", "dinner", "echo",
    "ember", "engine", "falcon", "forest", "garden", "glacier", "harbor", "helium", "island",
    "jacket", "kernel", "ladder", "lemon", "marble", "meadow", "mirror", "network", "ocean",
    "orbit", "paper", "pepper", "planet", "quartz", "river", "rocket", "saddle", "signal",
    "silver", "summer", "thunder", "timber", "tunnel", "velvet", "violet", "window", "winter",
];

const STATUSES: [Option<MessageStatus>; 3] =
    [None, Some(MessageStatus::Sent), Some(MessageStatus::Read)];

/// Insert `count` generated messages, numbered from 1.
///
/// Returns how many were written; uuids are fresh so nothing deduplicates.
pub async fn seed(store: &dyn MessageStore, count: usize) -> Result<usize, StoreError> {
    let messages = generate(count);
    let mut inserted = 0;

    for message in &messages {
        if !store.insert(message).await?.is_duplicate() {
            inserted += 1;
        }
    }

    tracing::info!(count = inserted, backend = store.backend_name(), "Seeded fixture messages");
    Ok(inserted)
}

/// Build `count` messages: `"Message {i}: "` followed by four to eight random
/// words, with a random status (possibly unset).
pub fn generate(count: usize) -> Vec<Message> {
    let mut rng = rand::rng();

    (1..=count)
        .filter_map(|i| {
            let word_count = rng.random_range(4..=8);
            let words: Vec<&str> = WORDS.choose_multiple(&mut rng, word_count).copied().collect();
            let text = format!("Message {}: {}", i, words.join(" "));

            let mut message = Message::new(text).ok()?;
            message.set_status(STATUSES.choose(&mut rng).copied().flatten());
            Some(message)
        })
        .collect()
}
