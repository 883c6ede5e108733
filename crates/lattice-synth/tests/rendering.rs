//! End-to-end rendering of volume blocks and constraint listings.

use std::sync::Arc;

use lattice_core::{ParamCatalog, ParamMeta, ParamType, Score};
use lattice_graph::{ConstraintEdge, Resource, ResourceGraph, attr};
use lattice_synth::{
    Catalogs, ConfigSynthesizer, HostSection, PortAllocator, StaticHosts, SynthError,
    VolumeResource, VolumeSpec,
};
use proptest::prelude::*;

fn catalogs() -> Catalogs {
    Catalogs {
        resource: Arc::new(
            ParamCatalog::new()
                .with(ParamMeta::new("protocol").with_default("C"))
                .with(ParamMeta::new("rate").in_section("syncer"))
                .with(ParamMeta::new("allow-two-primaries").with_type(ParamType::Boolean).with_default("no").in_section("net")),
        ),
        volume: Arc::new(
            ParamCatalog::new()
                .with(ParamMeta::new("device"))
                .with(ParamMeta::new("disk"))
                .with(ParamMeta::new("meta-disk").with_default("internal")),
        ),
        order: Arc::new(
            ParamCatalog::new()
                .with(ParamMeta::new(attr::SCORE).with_type(ParamType::Score))
                .with(ParamMeta::new(attr::SYMMETRICAL).with_type(ParamType::Boolean).with_default("true"))
                .with(ParamMeta::new(attr::FIRST_ACTION).with_default("start"))
                .with(ParamMeta::new(attr::THEN_ACTION).with_default("start")),
        ),
        colocation: Arc::new(
            ParamCatalog::new()
                .with(ParamMeta::new(attr::SCORE).with_type(ParamType::Score))
                .with(ParamMeta::new(attr::RSC_ROLE).with_default("Started"))
                .with(ParamMeta::new(attr::WITH_RSC_ROLE).with_default("Started")),
        ),
    }
}

fn synthesizer() -> ConfigSynthesizer {
    let hosts = StaticHosts::new()
        .with_interface("alpha", "eth1", "10.0.0.1".parse().unwrap())
        .with_interface("beta", "eth1", "10.0.0.2".parse().unwrap());
    ConfigSynthesizer::new(catalogs(), Arc::new(hosts))
}

#[test]
fn allocated_resource_renders_both_hosts() {
    let mut resource = VolumeResource::new("r1")
        .with_param("rate", "100M")
        .with_host(
            "alpha",
            HostSection {
                address_selector: Some("eth1".into()),
                port: None,
                volumes: vec![VolumeSpec::new(0).with_param("disk", "/dev/sdb1")],
            },
        )
        .with_host(
            "beta",
            HostSection {
                address_selector: Some("eth1".into()),
                port: None,
                volumes: vec![VolumeSpec::new(0).with_param("disk", "/dev/sdc1")],
            },
        );
    PortAllocator::default().assign(&mut resource, &[]).unwrap();

    let expected = "\
resource r1 {
    syncer {
        rate 100M;
    }
    on alpha {
        volume 0 {
            device /dev/drbd0;
            disk /dev/sdb1;
        }
        address 10.0.0.1:7788;
    }
    on beta {
        volume 0 {
            device /dev/drbd0;
            disk /dev/sdc1;
        }
        address 10.0.0.2:7788;
    }
}
";
    assert_eq!(synthesizer().render_volume(&resource).unwrap(), expected);
}

#[test]
fn host_without_address_is_reported() {
    let resource = VolumeResource::new("r0").with_host(
        "gamma",
        HostSection::new()
            .with_address("eth1", 7788)
            .with_volume(VolumeSpec::new(0).with_param("disk", "/dev/sdb1")),
    );
    let err = synthesizer().render_volume(&resource).unwrap_err();
    assert_eq!(
        err,
        SynthError::MissingAddress {
            resource: "r0".into(),
            host: "gamma".into()
        }
    );
}

#[test]
fn pending_edges_render_with_generated_ids() {
    let graph = ResourceGraph::new();
    let db = graph.add_resource(Resource::service("db")).unwrap();
    let web = graph.add_resource(Resource::service("web")).unwrap();
    graph
        .upsert_edge(ConstraintEdge::order(db, web, Score::PlusInfinity))
        .unwrap();
    graph
        .upsert_edge(ConstraintEdge::colocation(web, db, Score::PlusInfinity).with_attr(attr::WITH_RSC_ROLE, "Master"))
        .unwrap();

    let lines = synthesizer().render_constraints(&graph).unwrap();
    assert_eq!(
        lines,
        vec![
            "order ord_db_web INFINITY: db web".to_string(),
            "colocation col_web_db INFINITY: web db:Master".to_string(),
        ]
    );
}

#[test]
fn conflicting_score_refuses_to_render() {
    let graph = ResourceGraph::new();
    let a = graph.add_resource(Resource::service("a")).unwrap();
    let b = graph.add_resource(Resource::service("b")).unwrap();
    let edge = ConstraintEdge::colocation(a, b, Score::Conflict).with_id("c1");
    assert!(matches!(
        synthesizer().render_constraint(&edge, &graph),
        Err(SynthError::ConflictingScore { .. })
    ));
}

fn arb_score() -> impl Strategy<Value = Score> {
    prop_oneof![
        Just(Score::Unset),
        Just(Score::PlusInfinity),
        Just(Score::MinusInfinity),
        (-5000i64..5000).prop_map(Score::value),
    ]
}

proptest! {
    #[test]
    fn rendering_is_idempotent(
        scores in proptest::collection::vec(arb_score(), 1..8),
        rate in "[1-9][0-9]{0,3}M",
    ) {
        let graph = ResourceGraph::new();
        let keys: Vec<_> = (0..4)
            .map(|i| graph.add_resource(Resource::service(&format!("r{i}"))).unwrap())
            .collect();
        for (i, score) in scores.iter().enumerate() {
            let a = keys[i % keys.len()];
            let b = keys[(i + 1) % keys.len()];
            let edge = if i % 2 == 0 {
                ConstraintEdge::order(a, b, *score)
            } else {
                ConstraintEdge::colocation(a, b, *score)
            };
            graph.upsert_edge(edge.with_id(format!("e{i}"))).unwrap();
        }
        let resource = VolumeResource::new("r0").with_param("rate", &rate).with_host(
            "alpha",
            HostSection::new()
                .with_address("eth1", 7788)
                .with_volume(VolumeSpec::new(0).with_param("device", "/dev/drbd0")),
        );

        let synth = synthesizer();
        prop_assert_eq!(synth.render_constraints(&graph).unwrap(), synth.render_constraints(&graph).unwrap());
        prop_assert_eq!(synth.render_volume(&resource).unwrap(), synth.render_volume(&resource).unwrap());
    }
}
