#![allow(dead_code)]

use instant::Duration;
use pairchat_core::{EngineConfig, MatchState, Phase};
use pairchat_rtc::{Switchboard, UserIntent};

pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";
pub const CAROL: &str = "carol";

/// Route engine logs through the test harness; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A switchboard with Alice and Bob online
pub fn pair(config: EngineConfig) -> Switchboard {
    init_tracing();
    let mut board = Switchboard::new(config);
    board.add_client(ALICE, "Alice").unwrap();
    board.add_client(BOB, "Bob").unwrap();
    board
}

/// Alice and Bob plus Carol, who never gets matched first
pub fn trio(config: EngineConfig) -> Switchboard {
    let mut board = pair(config);
    board.add_client(CAROL, "Carol").unwrap();
    board
}

/// Both clients search and get paired
pub fn matched(board: &mut Switchboard) {
    board.intent(ALICE, UserIntent::StartSearch).unwrap();
    board.intent(BOB, UserIntent::StartSearch).unwrap();
}

/// Both clients search, get paired and accept
pub fn chatting(board: &mut Switchboard) {
    matched(board);
    board.intent(ALICE, UserIntent::Accept).unwrap();
    board.intent(BOB, UserIntent::Accept).unwrap();
}

/// Alice and Bob chatting until every retry timed out on both sides
///
/// Transports stay unconnected until auto-connect is switched back on.
pub fn exhausted() -> Switchboard {
    let config = EngineConfig::voice()
        .with_retry(vec![100], 2)
        .with_connect_timeout(Duration::from_secs(1));
    let mut board = pair(config);
    chatting(&mut board);
    board.set_auto_connect(ALICE, false).unwrap();
    board.set_auto_connect(BOB, false).unwrap();

    board.drop_link(ALICE).unwrap();
    board.advance(Duration::from_secs(10));
    board
}

/// Both sides chatting over a live connection with a fresh retry budget
pub fn assert_connected(board: &Switchboard) {
    for id in [ALICE, BOB] {
        let engine = board.engine(id).unwrap();
        assert_eq!(engine.state(), MatchState::Chatting, "{} left the chat", id);
        assert_eq!(engine.phase(), &Phase::Connected, "{} is not connected", id);
        assert_eq!(engine.retry_context().attempt, 0);
        assert!(board.backend(id).unwrap().remote_stream().is_some());
    }
}
