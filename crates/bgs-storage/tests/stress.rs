//! Stress tests for bgs-storage
//!
//! These tests fill the capped log collections past their production
//! capacities and check the bounds, the eviction order and the indexes
//! under load and concurrent writers.

use std::sync::Arc;
use std::time::Instant;

use bgs_core::{ApiError, ApiRequest, ChatAuthor, ChatMessage, ErrorInfo, RoomId, UserId};
use bgs_storage::{
    ApiErrorLog, Capacities, ChatLog, Direction, DocumentId, DocumentStore, create_api_error_collection,
    create_chat_message_collection,
};
use rand::Rng;
use serde_json::json;

const MIB: u64 = 1024 * 1024;

fn author(name: &str) -> ChatAuthor {
    ChatAuthor::new(UserId::new(name).unwrap(), name)
}

fn error_for(user: &str, seq: i64, stack_len: usize) -> ApiError {
    ApiError::new(
        ErrorInfo::new("InternalError", format!("failure {seq}"))
            .with_stack(&"    at handler (server.js:1:1)\n".repeat(stack_len)),
        ApiRequest::new("/api/games", "POST", &json!({ "seq": seq })),
        Some(UserId::new(user).unwrap()),
    )
    .at(1_700_000_000_000 + seq)
}

// ============================================================================
// Chat log capacity
// ============================================================================

/// Fill the 100 MiB chat log well past capacity with large messages
#[test]
fn test_chat_byte_cap_evicts_oldest() {
    let store = DocumentStore::in_memory().unwrap();
    let chat = create_chat_message_collection(&store).unwrap();
    let room = RoomId::new("lobby").unwrap();
    let ann = author("ann");

    // ~256 KiB per message, ~400 fit in 100 MiB
    let body = "m".repeat(256 * 1024);
    let total = 600;

    let start = Instant::now();
    for i in 0..total {
        let message = ChatMessage::text(room.clone(), ann.clone(), format!("{i:04}{body}"));
        chat.insert_one(&message).expect("insert chat message");
    }
    println!("Inserted {} large messages in {:?}", total, start.elapsed());

    let stats = chat.stats().unwrap();
    assert!(stats.bytes <= 100 * MIB, "bytes {} over cap", stats.bytes);
    assert!(stats.evicted > 0);
    assert_eq!(stats.count + stats.evicted, total);

    // The oldest messages are the ones gone
    assert!(chat.get(DocumentId(1)).unwrap().is_none());
    assert!(chat.get(DocumentId(total)).unwrap().is_some());

    let oldest = chat.natural(Direction::Forward, Some(1)).unwrap();
    assert_eq!(oldest[0].id, DocumentId(stats.evicted + 1));

    // The room index only references surviving documents
    let log = ChatLog::new(chat);
    let recent = log.recent_in_room(&room, total as usize).unwrap();
    assert_eq!(recent.len() as u64, stats.count);
    assert!(recent[0].document.text_body().starts_with(&format!("{:04}", total - 1)));
}

/// Random payload sizes keep the byte total under the cap at every step
#[test]
fn test_chat_byte_cap_with_random_sizes() {
    let store = DocumentStore::in_memory().unwrap();
    let capacities = Capacities {
        chat_size_bytes: 256 * 1024,
        ..Capacities::default()
    };
    let chat = ChatLog::provision(&store, &capacities).unwrap();
    let room = RoomId::new("random").unwrap();
    let bob = author("bob");
    let mut rng = rand::rng();

    for _ in 0..2_000 {
        let len = rng.random_range(1..4096);
        chat.post(&ChatMessage::text(room.clone(), bob.clone(), "r".repeat(len)))
            .unwrap();
        let stats = chat.collection().stats().unwrap();
        assert!(stats.bytes <= capacities.chat_size_bytes);
    }
}

// ============================================================================
// API error log capacity
// ============================================================================

/// Count bound binds first for small reports
#[test]
fn test_api_error_count_cap() {
    let store = DocumentStore::in_memory().unwrap();
    let errors = create_api_error_collection(&store).unwrap();
    let total: i64 = 10_500;

    let start = Instant::now();
    let batch: Vec<_> = (0..total).map(|i| error_for("u1", i, 1)).collect();
    for chunk in batch.chunks(500) {
        errors.insert_many(chunk).expect("insert error batch");
    }
    println!("Inserted {} error reports in {:?}", total, start.elapsed());

    let stats = errors.stats().unwrap();
    assert_eq!(stats.count, 10_000);
    assert_eq!(stats.evicted, 500);
    assert!(stats.bytes <= 10 * MIB);

    // The 10,000 newest survive
    let survivors = errors.natural(Direction::Forward, None).unwrap();
    assert_eq!(survivors.len(), 10_000);
    assert_eq!(survivors[0].document.error.message, "failure 500");
    assert_eq!(survivors[9_999].document.error.message, "failure 10499");
}

/// Byte bound binds first for large reports
#[test]
fn test_api_error_byte_cap() {
    let store = DocumentStore::in_memory().unwrap();
    let log = ApiErrorLog::provision(&store, &Capacities::default()).unwrap();

    // ~3 KiB per report, so 10 MiB holds far fewer than 10,000
    for i in 0..6_000 {
        log.record(&error_for("u2", i, 100)).unwrap();
    }

    let stats = log.collection().stats().unwrap();
    assert!(stats.bytes <= 10 * MIB);
    assert!(stats.count < 10_000);
    assert_eq!(stats.count + stats.evicted, 6_000);

    let user = UserId::new("u2").unwrap();
    let recent = log.recent_for_user(&user, 3).unwrap();
    let messages: Vec<_> = recent.iter().map(|s| s.document.error.message.as_str()).collect();
    assert_eq!(messages, vec!["failure 5999", "failure 5998", "failure 5997"]);
}

// ============================================================================
// Concurrency
// ============================================================================

/// Many writers appending to the same room keep the index consistent
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_posts() {
    let store = DocumentStore::in_memory().unwrap();
    let capacities = Capacities {
        chat_size_bytes: 64 * 1024,
        ..Capacities::default()
    };
    let chat = Arc::new(ChatLog::provision(&store, &capacities).unwrap());
    let room = RoomId::new("busy").unwrap();

    let mut handles = Vec::new();
    for writer in 0..8 {
        let chat = Arc::clone(&chat);
        let room = room.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let who = author(&format!("writer{writer}"));
            for i in 0..200 {
                chat.post(&ChatMessage::text(room.clone(), who.clone(), format!("{writer}:{i}")))
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = chat.collection().stats().unwrap();
    assert_eq!(stats.count + stats.evicted, 1_600);
    assert!(stats.bytes <= capacities.chat_size_bytes);

    let recent = chat.recent_in_room(&room, usize::MAX).unwrap();
    assert_eq!(recent.len() as u64, stats.count);
    assert!(recent.windows(2).all(|w| w[0].id > w[1].id));
}
