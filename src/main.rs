use anyhow::Result;
use rune_config::RuneConfig;
use rune_presence::{
    AnimationParams, EasingFunction, ElementId, GroupInterceptor, GroupOptions, MotionOptions,
    MotionPolicy, PresenceBoundary, PresenceChild, Scene, SceneEvent,
};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing, preferring the configured filter over RUST_LOG.
fn init_tracing(config: &RuneConfig) {
    let filter = config
        .demo
        .log_filter
        .as_deref()
        .map(EnvFilter::new)
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("rune_motion=info,rune_presence=debug"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

fn page(config: &RuneConfig) -> MotionOptions {
    MotionOptions::new()
        .initial(AnimationParams::snapshot([("opacity", 0.0), ("x", -40.0)]))
        .animate(
            AnimationParams::new()
                .set("opacity", 1.0)
                .set("x", 0.0)
                .with_duration(config.group.enter_ms)
                .with_easing(EasingFunction::EaseOut),
        )
        .exit(
            AnimationParams::new()
                .set("opacity", 0.0)
                .set("x", 40.0)
                .with_duration(config.group.exit_ms)
                .with_easing(EasingFunction::EaseIn),
        )
}

fn group_options(config: &RuneConfig) -> GroupOptions {
    GroupOptions::new()
        .initial(AnimationParams::snapshot([("opacity", 0.0), ("height", 0.0)]))
        .enter(
            AnimationParams::new()
                .set("opacity", 1.0)
                .set("height", 32.0)
                .with_duration(config.group.enter_ms),
        )
        .exit(
            AnimationParams::new()
                .set("opacity", 0.0)
                .set("height", 0.0)
                .with_duration(config.group.exit_ms),
        )
        .stagger(config.group.stagger(), config.group.direction)
}

fn log_event(frame: u32, event: &SceneEvent) {
    match event {
        SceneEvent::Presence(event) => info!(frame, ?event, "presence"),
        SceneEvent::Animation(event) => debug!(frame, ?event, "animation"),
    }
}

fn main() -> Result<()> {
    let config = RuneConfig::load();
    init_tracing(&config);
    info!(?config, "configuration loaded");

    let mut scene = Scene::default().with_motion(MotionPolicy {
        reduced_motion: config.motion.reduced_motion,
    });

    let tree = scene.tree_mut();
    let root = tree.root();
    let slot = tree.create_element("main");
    let list = tree.create_element("ul");
    tree.append_child(root, slot)?;
    tree.append_child(root, list)?;
    let mut items: Vec<ElementId> = Vec::new();
    for i in 0..3 {
        let li = tree.create_element(format!("item-{i}"));
        tree.append_child(list, li)?;
        items.push(li);
    }
    let home = tree.create_element("home");
    let settings = tree.create_element("settings");

    let mut boundary = PresenceBoundary::new(slot, config.presence);
    let mut group = GroupInterceptor::new(&mut scene, list, group_options(&config).appear(true));
    group.mount(&mut scene);
    boundary.set_child(
        &mut scene,
        Some(PresenceChild::new("home", home, page(&config))),
    );

    for frame in 0..config.demo.frames {
        match frame {
            10 => {
                group.mutate(&mut scene, |tree| -> Result<()> {
                    for i in 3..5 {
                        let li = tree.create_element(format!("item-{i}"));
                        tree.append_child(list, li)?;
                        items.push(li);
                    }
                    Ok(())
                })?;
            }
            30 => boundary.set_child(
                &mut scene,
                Some(PresenceChild::new("settings", settings, page(&config))),
            ),
            40 => {
                let middle = items[items.len() / 2];
                group.mutate(&mut scene, |tree| tree.detach(middle))?;
            }
            80 => boundary.set_child(&mut scene, None),
            _ => {}
        }

        scene.tick(config.motion.frame_ms);
        boundary.poll(&mut scene);
        group.poll(&mut scene);
        for event in scene.drain_events() {
            log_event(frame, &event);
        }
    }

    info!(
        boundary = ?boundary.state(),
        list_children = scene.tree().children(list).len(),
        exiting = group.exiting_count(),
        "demo finished"
    );
    group.disconnect(&mut scene);
    Ok(())
}
