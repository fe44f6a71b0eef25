use chat0_llm::{Message, Role};

#[test]
fn test_message_system() {
    let msg = Message::system("You are helpful");
    assert_eq!(msg.role(), Role::System);
    assert_eq!(msg.content(), "You are helpful");
}

#[test]
fn test_message_human() {
    let msg = Message::human("Hello");
    assert_eq!(msg.role(), Role::User);
}

#[test]
fn test_message_ai() {
    let msg = Message::ai("Hi there!");
    assert_eq!(msg.role(), Role::Assistant);
}

#[test]
fn test_message_from_role() {
    assert_eq!(Message::from_role(Role::User, "a"), Message::human("a"));
    assert_eq!(Message::from_role(Role::Assistant, "b"), Message::ai("b"));
    assert_eq!(Message::from_role(Role::System, "c"), Message::system("c"));
}

#[test]
fn test_message_serialization_human() {
    let msg = Message::human("Hello");
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"role\":\"user\""));
    assert!(json.contains("Hello"));
}

#[test]
fn test_message_serialization_ai() {
    let msg = Message::ai("Response");
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"role\":\"assistant\""));
}

#[test]
fn test_message_deserialization() {
    let json = r#"{"role":"user","content":"Test"}"#;
    let msg: Message = serde_json::from_str(json).unwrap();
    assert_eq!(msg.role(), Role::User);
    assert_eq!(msg.content(), "Test");
}

#[test]
fn test_role_wire_names() {
    assert_eq!(Role::User.as_str(), "user");
    assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
}
