use cucumber::{given, then, when};
use instant::Duration;
use pairchat_rtc::UserIntent;
use pairchat_tests::ChatWorld;

// ===== Given Steps =====

#[given(expr = "{string} is online")]
async fn user_is_online(world: &mut ChatWorld, name: String) {
    world.add_user(&name);
}

#[given(expr = "{string} and {string} are matched")]
async fn users_are_matched(world: &mut ChatWorld, first: String, second: String) {
    world.intent(&first, UserIntent::StartSearch);
    world.intent(&second, UserIntent::StartSearch);
}

#[given(expr = "{string} and {string} are chatting")]
async fn users_are_chatting(world: &mut ChatWorld, first: String, second: String) {
    users_are_matched(world, first.clone(), second.clone()).await;
    world.intent(&first, UserIntent::Accept);
    world.intent(&second, UserIntent::Accept);
}

// ===== When Steps =====

#[when(expr = "{int} ms pass")]
async fn time_passes(world: &mut ChatWorld, ms: u64) {
    world.board_mut().advance(Duration::from_millis(ms));
    world.collect_notices();
}

#[when(expr = "{string} hangs up")]
async fn user_hangs_up(world: &mut ChatWorld, name: String) {
    world.intent(&name, UserIntent::HangUp);
}

// ===== Then Steps =====

#[then(expr = "{string} should be in phase {string}")]
async fn user_in_phase(world: &mut ChatWorld, name: String, phase: String) {
    assert_eq!(
        world.phase(&name).name(),
        phase,
        "{} is in {:?}",
        name,
        world.phase(&name)
    );
}

#[then(expr = "{string} should be in state {string}")]
async fn user_in_state(world: &mut ChatWorld, name: String, state: String) {
    assert_eq!(world.state(&name).to_string(), state);
}

#[then(regex = r#"^"([^"]+)" should have emitted "([^"]+)" (\d+) times?$"#)]
async fn user_emitted(world: &mut ChatWorld, name: String, event: String, count: usize) {
    assert_eq!(
        world.emitted(&name, &event),
        count,
        "{} emitted {} an unexpected number of times",
        name,
        event
    );
}

#[then(expr = "{string} should see the message {string}")]
async fn user_sees_message(world: &mut ChatWorld, name: String, message: String) {
    let messages = world.messages(&name);
    assert!(
        messages.contains(&message),
        "{} saw {:?}, expected {:?}",
        name,
        messages,
        message
    );
}
