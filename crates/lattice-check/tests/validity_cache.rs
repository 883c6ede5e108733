//! Cache reuse of per-field verdicts across touched-field checks.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use lattice_check::{FieldCheckEngine, FieldSource, FieldValues, Violation};
use lattice_core::{ParamCatalog, ParamMeta, ParamType};
use proptest::prelude::*;

fn counted_engine(calls: Arc<AtomicUsize>) -> FieldCheckEngine {
    let catalog = ParamCatalog::new()
        .with(ParamMeta::new("disk"))
        .with(ParamMeta::new("rate").with_type(ParamType::Integer));
    FieldCheckEngine::new(Arc::new(catalog)).with_rule("disk", move |value, _| {
        calls.fetch_add(1, Ordering::SeqCst);
        if value.starts_with("/dev/") {
            Ok(())
        } else {
            Err("disk must be a device path".to_string())
        }
    })
}

#[test]
fn untouched_field_reuses_cached_verdict() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = counted_engine(calls.clone());
    let mut values = FieldValues::new().with_live("disk", "/dev/sdb1").with_live("rate", "10");

    engine.check(&values);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    values.set_live("rate", "20");
    let check = engine.check_touched(&values, "rate");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(check.is_correct());
}

#[test]
fn touched_field_is_always_revalidated() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = counted_engine(calls.clone());
    let values = FieldValues::new().with_live("disk", "/dev/sdb1");

    engine.check(&values);
    engine.check_touched(&values, "disk");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn moved_value_misses_the_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = counted_engine(calls.clone());
    let mut values = FieldValues::new().with_live("disk", "/dev/sdb1");
    engine.check(&values);

    values.set_live("disk", "sdb1");
    let check = engine.check_touched(&values, "rate");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        check.violation("disk"),
        Some(&Violation::Rule("disk must be a device path".into()))
    );
}

#[test]
fn cached_incorrect_verdict_still_reported() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = counted_engine(calls.clone());
    let mut values = FieldValues::new().with_live("disk", "sdb1");
    assert!(!engine.check(&values).is_correct());

    values.set_live("rate", "5");
    let check = engine.check_touched(&values, "rate");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(check.incorrect, vec!["disk".to_string()]);
}

#[test]
fn full_check_refreshes_after_clear() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = counted_engine(calls.clone());
    let values = FieldValues::new().with_live("disk", "/dev/sdb1");
    engine.check(&values);
    engine.clear_cache();
    engine.check_touched(&values, "rate");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

fn dual_primary(dual: &str, protocol: &str) -> Result<(), String> {
    if dual == "yes" && protocol != "C" {
        Err("dual-primary mode requires protocol C".to_string())
    } else {
        Ok(())
    }
}

/// `allow-two-primaries` and `protocol` constrain each other.
fn cross_field_engine() -> FieldCheckEngine {
    let catalog = ParamCatalog::new()
        .with(ParamMeta::new("protocol").with_default("C"))
        .with(ParamMeta::new("allow-two-primaries").with_default("no"))
        .with(ParamMeta::new("rate"));
    let live = |source: &dyn FieldSource, name: &str, fallback: &str| {
        source.live_value(name).unwrap_or_else(|| fallback.to_string())
    };
    FieldCheckEngine::new(Arc::new(catalog))
        .with_rule_reading("protocol", &["allow-two-primaries"], move |value, source| {
            dual_primary(&live(source, "allow-two-primaries", "no"), value)
        })
        .with_rule_reading("allow-two-primaries", &["protocol"], move |value, source| {
            dual_primary(value, &live(source, "protocol", "C"))
        })
}

#[test]
fn partner_verdict_follows_cross_field_edit() {
    let engine = cross_field_engine();
    let mut values = FieldValues::new()
        .with_id("r0")
        .with_live("allow-two-primaries", "yes")
        .with_live("protocol", "A");
    assert_eq!(engine.check(&values).incorrect, vec!["protocol", "allow-two-primaries"]);

    values.set_live("protocol", "C");
    let touched = engine.check_touched(&values, "protocol");
    assert!(touched.is_correct(), "{touched:?}");
    engine.clear_cache();
    assert_eq!(touched, engine.check(&values));
}

#[test]
fn rule_inputs_unchanged_still_reuse() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let catalog = ParamCatalog::new().with(ParamMeta::new("protocol")).with(ParamMeta::new("rate"));
    let engine = FieldCheckEngine::new(Arc::new(catalog)).with_rule_reading(
        "protocol",
        &["allow-two-primaries"],
        move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
    );
    let mut values = FieldValues::new().with_live("protocol", "C");
    engine.check(&values);
    values.set_live("rate", "10M");
    engine.check_touched(&values, "rate");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    values.set_live("allow-two-primaries", "yes");
    engine.check_touched(&values, "rate");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn verdicts_are_not_shared_between_objects() {
    let engine = cross_field_engine();
    let r0 = FieldValues::new()
        .with_id("r0")
        .with_live("allow-two-primaries", "yes")
        .with_live("protocol", "C");
    let r1 = FieldValues::new()
        .with_id("r1")
        .with_live("allow-two-primaries", "yes")
        .with_live("protocol", "A");
    assert!(engine.check(&r0).is_correct());
    assert!(!engine.check(&r1).is_correct());

    let r0 = r0.with_live("rate", "40M");
    let touched = engine.check_touched(&r0, "rate");
    assert!(touched.is_correct(), "{touched:?}");
}

#[test]
fn forget_drops_object_and_its_scoped_children() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = counted_engine(calls.clone());
    let parent = FieldValues::new().with_id("r0").with_live("disk", "/dev/sdb1");
    let child = FieldValues::new().with_id("r0/alpha/volume 0").with_live("disk", "/dev/sdb1");
    let other = FieldValues::new().with_id("r01").with_live("disk", "/dev/sdb1");
    engine.check(&parent);
    engine.check(&child);
    engine.check(&other);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    engine.forget("r0");
    engine.check_touched(&parent, "rate");
    engine.check_touched(&child, "rate");
    engine.check_touched(&other, "rate");
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

proptest! {
    #[test]
    fn touched_check_agrees_with_full_check(
        disk in "(/dev/)?[a-z]{1,4}",
        rate in "[0-9x]{1,3}",
        touched in prop_oneof![Just("disk"), Just("rate")],
    ) {
        let engine = counted_engine(Arc::new(AtomicUsize::new(0)));
        let values = FieldValues::new().with_live("disk", "/dev/sda").with_live("rate", "1");
        engine.check(&values);

        let edited = FieldValues::new().with_live("disk", &disk).with_live("rate", &rate);
        let partial = engine.check_touched(&edited, touched);
        engine.clear_cache();
        let full = engine.check(&edited);
        prop_assert_eq!(partial, full);
    }
}
