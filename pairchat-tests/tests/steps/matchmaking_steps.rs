use cucumber::{given, then, when};
use pairchat_rtc::UserIntent;
use pairchat_tests::ChatWorld;

#[given(expr = "{string} starts searching")]
#[when(expr = "{string} starts searching")]
async fn user_starts_searching(world: &mut ChatWorld, name: String) {
    world.intent(&name, UserIntent::StartSearch);
}

#[when(expr = "{string} stops searching")]
async fn user_stops_searching(world: &mut ChatWorld, name: String) {
    world.intent(&name, UserIntent::StopSearch);
}

#[when(expr = "{string} accepts the match")]
async fn user_accepts(world: &mut ChatWorld, name: String) {
    world.intent(&name, UserIntent::Accept);
}

#[when(expr = "{string} skips the match")]
async fn user_skips(world: &mut ChatWorld, name: String) {
    world.intent(&name, UserIntent::Skip);
}

#[then(expr = "{string} should be matched with {string}")]
async fn users_matched_together(world: &mut ChatWorld, name: String, partner: String) {
    let expected = world.id(&partner);
    let session = world
        .engine(&name)
        .session()
        .unwrap_or_else(|| panic!("{} has no session", name));
    assert_eq!(session.peer().as_str(), expected);

    let back = world
        .engine(&partner)
        .session()
        .unwrap_or_else(|| panic!("{} has no session", partner));
    assert_eq!(back.peer().as_str(), world.id(&name));
}
