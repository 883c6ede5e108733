//! Built-in parameter catalogs.
//!
//! Replicated-volume resources carry the usual DRBD options, grouped into
//! the `net`, `disk`, `syncer`, `startup` and `handlers` sections.
//! Services carry the resource manager's meta attributes. Constraint
//! catalogs describe the score and the per-endpoint action or role.

use std::sync::Arc;

use lattice_core::{CoreResult, ParamCatalog, ParamMeta, ParamType};
use lattice_graph::attr;
use lattice_synth::Catalogs;

const ROLES: [&str; 4] = ["Started", "Stopped", "Master", "Slave"];
const ACTIONS: [&str; 4] = ["start", "stop", "promote", "demote"];
const SPLIT_BRAIN_0PRI: [&str; 4] = ["disconnect", "discard-younger-primary", "discard-least-changes", "discard-zero-changes"];
const IO_ERROR: [&str; 3] = ["pass_on", "call-local-io-error", "detach"];

/// Options of a replicated-volume resource.
pub fn resource_catalog() -> CoreResult<ParamCatalog> {
    Ok(ParamCatalog::new()
        .with(
            ParamMeta::new("protocol")
                .with_default("C")
                .with_desc("Protocol", "Replication protocol: A async, B semi-sync, C sync.")
                .with_choices(["A", "B", "C"], true),
        )
        .with(
            ParamMeta::new("allow-two-primaries")
                .in_section("net")
                .with_type(ParamType::Boolean)
                .with_default("no")
                .with_desc("Dual primary", "Allow both nodes to be primary at once.")
                .advanced(),
        )
        .with(
            ParamMeta::new("after-sb-0pri")
                .in_section("net")
                .with_default("disconnect")
                .with_choices(SPLIT_BRAIN_0PRI, true)
                .advanced(),
        )
        .with(ParamMeta::new("shared-secret").in_section("net"))
        .with(
            ParamMeta::new("cram-hmac-alg")
                .in_section("net")
                .with_choices(["sha1", "sha256", "md5"], false),
        )
        .with(
            ParamMeta::new("on-io-error")
                .in_section("disk")
                .with_default("pass_on")
                .with_choices(IO_ERROR, true),
        )
        .with(ParamMeta::new("rate").in_section("syncer").with_regexp("[0-9]+[KMG]?")?)
        .with(ParamMeta::new("verify-alg").in_section("syncer").advanced())
        .with(
            ParamMeta::new("wfc-timeout")
                .in_section("startup")
                .with_type(ParamType::Integer)
                .with_default("0"),
        )
        .with(
            ParamMeta::new("degr-wfc-timeout")
                .in_section("startup")
                .with_type(ParamType::Integer)
                .with_default("60"),
        )
        .with(ParamMeta::new("split-brain").in_section("handlers").advanced())
        .with(ParamMeta::new("pri-on-incon-degr").in_section("handlers").advanced()))
}

/// Options of one volume on one host.
pub fn volume_catalog() -> CoreResult<ParamCatalog> {
    Ok(ParamCatalog::new()
        .with(ParamMeta::new("device").required().with_regexp("/dev/drbd[0-9]+")?)
        .with(ParamMeta::new("disk").required().with_regexp("/dev/.+")?)
        .with(ParamMeta::new("meta-disk").with_default("internal")))
}

pub fn order_catalog() -> ParamCatalog {
    ParamCatalog::new()
        .with(ParamMeta::new(attr::SCORE).with_type(ParamType::Score).with_desc("Score", "Order strength; INFINITY is mandatory."))
        .with(
            ParamMeta::new(attr::SYMMETRICAL)
                .with_type(ParamType::Boolean)
                .with_default("true")
                .advanced(),
        )
        .with(ParamMeta::new(attr::FIRST_ACTION).with_default("start").with_choices(ACTIONS, true))
        .with(ParamMeta::new(attr::THEN_ACTION).with_default("start").with_choices(ACTIONS, true))
}

pub fn colocation_catalog() -> ParamCatalog {
    ParamCatalog::new()
        .with(ParamMeta::new(attr::SCORE).with_type(ParamType::Score).with_desc("Score", "Colocation strength; -INFINITY keeps resources apart."))
        .with(ParamMeta::new(attr::RSC_ROLE).with_default("Started").with_choices(ROLES, true))
        .with(ParamMeta::new(attr::WITH_RSC_ROLE).with_default("Started").with_choices(ROLES, true))
}

/// Meta attributes of a service.
pub fn service_catalog() -> ParamCatalog {
    ParamCatalog::new()
        .with(ParamMeta::new("target-role").with_default("Started").with_choices(ROLES, true))
        .with(ParamMeta::new("is-managed").with_type(ParamType::Boolean).with_default("true"))
        .with(ParamMeta::new("migration-threshold").with_type(ParamType::Integer).advanced())
        .with(ParamMeta::new("resource-stickiness").with_type(ParamType::Score).advanced())
}

/// All built-in catalogs.
#[derive(Clone)]
pub struct BuiltinCatalogs {
    pub synth: Catalogs,
    pub service: Arc<ParamCatalog>,
}

impl BuiltinCatalogs {
    pub fn load() -> CoreResult<Self> {
        Ok(Self {
            synth: Catalogs {
                resource: Arc::new(resource_catalog()?),
                volume: Arc::new(volume_catalog()?),
                order: Arc::new(order_catalog()),
                colocation: Arc::new(colocation_catalog()),
            },
            service: Arc::new(service_catalog()),
        })
    }
}
