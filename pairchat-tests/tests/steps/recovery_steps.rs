use cucumber::{given, then, when};
use instant::Duration;
use pairchat_core::{MediaFailure, Phase};
use pairchat_rtc::UserIntent;
use pairchat_tests::ChatWorld;

// ===== Given Steps =====

#[given(expr = "retries every {int} ms at most {int} times")]
async fn retry_schedule(world: &mut ChatWorld, delay_ms: u64, max_attempts: u32) {
    assert!(world.board.is_none(), "Configure retries before anyone is online");
    world.config = world.config.clone().with_retry(vec![delay_ms], max_attempts);
}

#[given(expr = "a connect timeout of {int} ms")]
async fn connect_timeout(world: &mut ChatWorld, ms: u64) {
    assert!(world.board.is_none(), "Configure the timeout before anyone is online");
    world.config = world
        .config
        .clone()
        .with_connect_timeout(Duration::from_millis(ms));
}

#[given("the network stops connecting")]
async fn network_stops_connecting(world: &mut ChatWorld) {
    let ids: Vec<String> = world.users.values().cloned().collect();
    for id in ids {
        world.board_mut().set_auto_connect(&id, false).unwrap();
    }
}

#[given(expr = "{string} denies microphone access")]
async fn denies_microphone(world: &mut ChatWorld, name: String) {
    let id = world.id(&name);
    world
        .board_mut()
        .set_media_failure(&id, Some(MediaFailure::PermissionDenied))
        .unwrap();
}

// ===== When Steps =====

#[when(expr = "only the transport of {string} fails")]
async fn transport_fails(world: &mut ChatWorld, name: String) {
    let id = world.id(&name);
    world.board_mut().fail_transport(&id).unwrap();
    world.collect_notices();
}

#[when("the network connects again")]
async fn network_connects_again(world: &mut ChatWorld) {
    let ids: Vec<String> = world.users.values().cloned().collect();
    for id in ids {
        world.board_mut().set_auto_connect(&id, true).unwrap();
    }
}

#[when(expr = "the link between {string} and {string} drops")]
async fn link_drops(world: &mut ChatWorld, name: String, _partner: String) {
    let id = world.id(&name);
    world.board_mut().drop_link(&id).unwrap();
    world.collect_notices();
}

#[when(expr = "{string} retries now")]
async fn user_retries(world: &mut ChatWorld, name: String) {
    world.intent(&name, UserIntent::RetryNow);
}

#[when(expr = "{string} dismisses the failure")]
async fn user_dismisses(world: &mut ChatWorld, name: String) {
    world.intent(&name, UserIntent::Dismiss);
}

// ===== Then Steps =====

#[then(expr = "{string} should be retrying attempt {int} in {int} ms")]
async fn user_retrying(world: &mut ChatWorld, name: String, attempt: u32, delay_ms: u64) {
    match world.phase(&name) {
        Phase::Retrying {
            attempt: actual,
            delay_ms: actual_delay,
            ..
        } => {
            assert_eq!(actual, attempt);
            assert_eq!(actual_delay, delay_ms);
        }
        other => panic!("{} is in {:?}, not retrying", name, other),
    }
}

#[then(expr = "{string} should be on attempt {int}")]
async fn user_on_attempt(world: &mut ChatWorld, name: String, attempt: u32) {
    assert_eq!(world.engine(&name).retry_context().attempt, attempt);
}
