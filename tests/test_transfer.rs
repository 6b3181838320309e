mod helpers;

use helpers::{active_conversation, setup_engine, waiting_conversation};
use livedesk::{ConversationStatus, EngineError, SystemEvent};

#[tokio::test]
async fn test_transfer_updates_owner_and_keeps_active() {
    let engine = setup_engine().await;
    let id = active_conversation(&engine, "admin-1").await;

    let conversation = engine
        .conversations
        .transfer(&id, "admin-1", "admin-2")
        .await
        .unwrap();

    assert_eq!(conversation.status, ConversationStatus::Active);
    assert_eq!(conversation.owner_admin_id.as_deref(), Some("admin-2"));
    assert!(conversation.holds_ownership_invariant());

    // New owner has access, the old one is locked out
    assert!(engine.messages.get_messages(&id, "admin-2").await.is_ok());
    assert!(matches!(
        engine.messages.get_messages(&id, "admin-1").await,
        Err(EngineError::AccessDenied { .. })
    ));
}

#[tokio::test]
async fn test_transfer_appends_system_message_naming_new_owner() {
    let engine = setup_engine().await;
    let id = active_conversation(&engine, "admin-1").await;

    engine
        .conversations
        .transfer(&id, "admin-1", "admin-2")
        .await
        .unwrap();

    let messages = engine.db.list_messages(&id).await.unwrap();
    let notice = messages.last().unwrap();
    assert!(notice.is_system);
    assert!(notice.body.contains("Bob"));
}

#[tokio::test]
async fn test_transfer_by_non_owner_is_unauthorized_even_with_valid_target() {
    let engine = setup_engine().await;
    let id = active_conversation(&engine, "admin-1").await;

    let result = engine.conversations.transfer(&id, "admin-2", "admin-3").await;

    assert!(matches!(result, Err(EngineError::Unauthorized)));
    let conversation = engine.conversations.get_conversation(&id).await.unwrap();
    assert_eq!(conversation.owner_admin_id.as_deref(), Some("admin-1"));
}

#[tokio::test]
async fn test_transfer_by_non_owner_with_invalid_target_is_still_unauthorized() {
    let engine = setup_engine().await;
    let id = active_conversation(&engine, "admin-1").await;

    // Ownership is checked before the target's capability
    let result = engine
        .conversations
        .transfer(&id, "admin-2", "not-an-agent")
        .await;

    assert!(matches!(result, Err(EngineError::Unauthorized)));
}

#[tokio::test]
async fn test_transfer_to_non_agent_is_invalid_target() {
    let engine = setup_engine().await;
    let id = active_conversation(&engine, "admin-1").await;

    let result = engine
        .conversations
        .transfer(&id, "admin-1", "not-an-agent")
        .await;

    assert!(matches!(result, Err(EngineError::InvalidTarget)));
    let conversation = engine.conversations.get_conversation(&id).await.unwrap();
    assert_eq!(conversation.owner_admin_id.as_deref(), Some("admin-1"));
}

#[tokio::test]
async fn test_transfer_on_waiting_conversation_is_unauthorized() {
    let engine = setup_engine().await;
    let id = waiting_conversation(&engine).await;

    let result = engine.conversations.transfer(&id, "admin-1", "admin-2").await;

    assert!(matches!(result, Err(EngineError::Unauthorized)));
}

#[tokio::test]
async fn test_transfer_publishes_event() {
    let engine = setup_engine().await;
    let id = active_conversation(&engine, "admin-1").await;
    let mut rx = engine.events.subscribe();

    engine
        .conversations
        .transfer(&id, "admin-1", "admin-2")
        .await
        .unwrap();

    // Skip unrelated events until the transfer shows up
    loop {
        let event = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("no transfer event published")
            .unwrap();
        if let SystemEvent::ConversationTransferred {
            conversation_id,
            from_admin_id,
            to_admin_id,
            ..
        } = event
        {
            assert_eq!(conversation_id, id);
            assert_eq!(from_admin_id, "admin-1");
            assert_eq!(to_admin_id, "admin-2");
            break;
        }
    }
}

#[tokio::test]
async fn test_chained_transfer_follows_live_owner() {
    let engine = setup_engine().await;
    let id = active_conversation(&engine, "admin-1").await;

    engine
        .conversations
        .transfer(&id, "admin-1", "admin-2")
        .await
        .unwrap();

    // The previous owner can no longer transfer
    let stale = engine.conversations.transfer(&id, "admin-1", "admin-3").await;
    assert!(matches!(stale, Err(EngineError::Unauthorized)));

    // The live owner can
    let conversation = engine
        .conversations
        .transfer(&id, "admin-2", "admin-3")
        .await
        .unwrap();
    assert_eq!(conversation.owner_admin_id.as_deref(), Some("admin-3"));
}
