// Behavioural tests for the configuration chain, in particular the
// site/here/up view distinction that silent misresolution would otherwise
// hide.

use trellis_config::{Config, ConfigError, Key, Layer};

#[test]
fn empty_chain_uses_defaults() {
    let cfg = Config::new();
    let with_default = Key::with_default("lanes", 4u32);
    let bare: Key<u32> = Key::new("lanes");

    assert_eq!(cfg.resolve(&with_default).unwrap(), 4);
    assert_eq!(cfg.try_resolve(&with_default), Some(4));
    assert_eq!(cfg.try_resolve(&bare), None);
    match cfg.resolve(&bare) {
        Err(ConfigError::KeyNotFound { key, id }) => {
            assert_eq!(key, "lanes");
            assert_eq!(id, bare.id());
        }
        other => panic!("expected KeyNotFound, got {other:?}"),
    }
}

#[test]
fn front_layer_overrides_back_layer() {
    let k: Key<&'static str> = Key::new("mode");
    let a = Config::new().alter(Layer::builder().set(&k, "old").build());
    let b = a.alter(Layer::builder().set(&k, "new").build());

    assert_eq!(b.resolve(&k).unwrap(), "new");
    // Composition never mutates the receiver.
    assert_eq!(a.resolve(&k).unwrap(), "old");
}

#[test]
fn key_mapped_only_in_front_layer_wins() {
    let k: Key<u32> = Key::new("width");
    let base = Config::new().alter(Layer::empty());
    let front = base.alter(Layer::builder().set(&k, 9).build());
    assert_eq!(front.resolve(&k).unwrap(), 9);
}

#[test]
fn identity_is_by_key_not_by_name() {
    let a: Key<u32> = Key::new("same-name");
    let b: Key<u32> = Key::new("same-name");
    let cfg = Config::new().alter(Layer::builder().set(&a, 1).build());
    assert_eq!(cfg.resolve(&a).unwrap(), 1);
    assert_eq!(cfg.try_resolve(&b), None);
}

#[test]
fn site_here_up_three_layer_distinction() {
    let k0: Key<&'static str> = Key::new("K0");
    let k1: Key<&'static str> = Key::with_default("K1", "absent");
    let k2: Key<&'static str> = Key::with_default("K2", "absent");
    let k3: Key<&'static str> = Key::with_default("K3", "absent");

    let l0 = Layer::builder().set(&k0, "V0").build();
    let l1 = Layer::builder().set(&k0, "V1").build();
    let l2 = Layer::builder()
        .bind(&k1, {
            let k0 = k0.clone();
            move |site, _here, _up| site.try_resolve(&k0).unwrap_or("absent")
        })
        .bind(&k2, {
            let k0 = k0.clone();
            move |_site, here, _up| here.try_resolve(&k0).unwrap_or("absent")
        })
        .bind(&k3, {
            let k0 = k0.clone();
            move |_site, _here, up| up.try_resolve(&k0).unwrap_or("absent")
        })
        .build();

    let cfg = Config::new().alter(l0).alter(l1).alter(l2);

    // site restarts at the outermost layer: L2 has no K0, L1 wins.
    assert_eq!(cfg.resolve(&k1).unwrap(), "V1");
    // here consults L2 alone, which defines no K0.
    assert_eq!(cfg.resolve(&k2).unwrap(), "absent");
    // up continues strictly after L2.
    assert_eq!(cfg.resolve(&k3).unwrap(), "V1");
}

#[test]
fn up_view_fetches_the_overridden_value() {
    let k: Key<u32> = Key::new("credits");
    let base = Config::new().alter(Layer::builder().set(&k, 10).build());
    let doubled = base.alter(
        Layer::builder()
            .bind(&k, {
                let k = k.clone();
                move |_site, _here, up| up.resolve(&k).map(|v| v * 2).unwrap_or(0)
            })
            .build(),
    );
    assert_eq!(doubled.resolve(&k).unwrap(), 20);
    assert_eq!(base.resolve(&k).unwrap(), 10);
}

#[test]
fn site_view_sees_layers_composed_in_front_of_the_resolver() {
    let name: Key<&'static str> = Key::new("name");
    let greeting: Key<String> = Key::new("greeting");

    let greeter = Layer::builder()
        .bind(&greeting, {
            let name = name.clone();
            move |site, _here, _up| format!("hello {}", site.try_resolve(&name).unwrap_or("?"))
        })
        .build();

    let cfg = Config::new()
        .alter(Layer::builder().set(&name, "alpha").build())
        .alter(greeter)
        // Composed in front of the greeter, yet site still sees it.
        .alter(Layer::builder().set(&name, "beta").build());

    assert_eq!(cfg.resolve(&greeting).unwrap(), "hello beta");
}

#[test]
fn or_else_appends_the_receiver_in_front() {
    let k: Key<u32> = Key::new("k");
    let j: Key<u32> = Key::new("j");
    let front = Config::new().alter(Layer::builder().set(&k, 1).build());
    let back = Config::new().alter(
        Layer::builder().set(&k, 2).set(&j, 7).build(),
    );

    let combined = front.or_else(&back);
    assert_eq!(combined.resolve(&k).unwrap(), 1);
    assert_eq!(combined.resolve(&j).unwrap(), 7);
    assert_eq!(combined.depth(), 2);
    // Neither operand is disturbed.
    assert_eq!(back.resolve(&k).unwrap(), 2);
    assert_eq!(front.try_resolve(&j), None);
}
