use cucumber::{given, then, when};
use pairchat_tests::ChatWorld;

#[given(expr = "{string} has a slow microphone")]
async fn slow_microphone(world: &mut ChatWorld, name: String) {
    let id = world.id(&name);
    world.board_mut().hold_media(&id, true).unwrap();
}

#[when(expr = "the microphone of {string} becomes ready")]
async fn microphone_ready(world: &mut ChatWorld, name: String) {
    let id = world.id(&name);
    world.board_mut().release_media(&id).unwrap();
    world.collect_notices();
}

#[when(expr = "{string} disconnects")]
async fn user_disconnects(world: &mut ChatWorld, name: String) {
    let id = world.id(&name);
    world.board_mut().disconnect(&id).unwrap();
    world.collect_notices();
}

#[then(expr = "{string} should have released all resources")]
async fn released_everything(world: &mut ChatWorld, name: String) {
    let engine = world.engine(&name);
    assert!(!engine.has_transport(), "{} still holds a transport", name);
    assert!(!engine.has_media(), "{} still holds media", name);

    let id = world.id(&name);
    let backend = world.board().backend(&id).unwrap();
    for transport in backend.transports() {
        assert!(transport.is_closed());
        assert_eq!(transport.close_calls(), 1);
    }
    for media in backend.media() {
        assert!(media.is_stopped());
        assert_eq!(media.stop_calls(), 1);
    }
    assert!(backend.remote_stream().is_none());
}
