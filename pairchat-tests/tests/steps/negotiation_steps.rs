use cucumber::{given, then, when};
use pairchat_core::{EngineConfig, TrackKind};
use pairchat_rtc::{EngineNotice, UserIntent};
use pairchat_tests::ChatWorld;

#[given(expr = "the {string} profile")]
async fn given_profile(world: &mut ChatWorld, profile: String) {
    assert!(world.board.is_none(), "Pick the profile before anyone is online");
    world.config = match profile.as_str() {
        "voice" => EngineConfig::voice(),
        "video" => EngineConfig::video(),
        other => panic!("Unknown profile '{}'", other),
    };
}

#[when(expr = "{string} mutes the microphone")]
async fn user_mutes(world: &mut ChatWorld, name: String) {
    world.intent(&name, UserIntent::SetMuted(true));
}

#[then(expr = "{string} should receive the remote stream")]
async fn user_receives_stream(world: &mut ChatWorld, name: String) {
    let id = world.id(&name);
    let backend = world.board().backend(&id).unwrap();
    assert!(backend.remote_stream().is_some(), "{} has no remote stream", name);
}

#[then(expr = "{string} should see the audio track disabled")]
async fn audio_track_disabled(world: &mut ChatWorld, name: String) {
    let toggled = EngineNotice::LocalTrackToggled {
        kind: TrackKind::Audio,
        enabled: false,
    };
    assert!(world.notices.get(&name).is_some_and(|n| n.contains(&toggled)));
}
