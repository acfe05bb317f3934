//! # Engine/solution dispatch
//!
//! Every analysis step (astrometry, photometry, orbit, ephemeris, propagation)
//! is computed by a *solution* from observation data and an *engine class*,
//! the selector of which provider does the work.
//!
//! ## Engine classes
//!
//! An engine class is a plain tag: one closed enum per domain
//! ([`AstrometryEngine`], [`PhotometryEngine`], [`OrbitEngine`],
//! [`EphemerisEngine`], [`PropagationEngine`]) gathered in the domain-tagged
//! [`AnyEngine`]. [`AnyEngine::Marker`] is the bare domain marker: it belongs to
//! a domain but names no provider, so no solution can run it.
//!
//! Engine *instances* (a connected web client, a fitted polynomial, a custom
//! orbit with its elements) implement [`ExarataEngine`]. Solutions only accept
//! classes; [`EngineArgument`] lets callers hand either and get a distinct
//! error for an instance.
//!
//! ## Dispatch
//!
//! ```text
//! EngineArgument ──resolve_engine──► domain enum ──match──► vehicle ──► VehicleResults ──take_*──► solution
//!      │                 │                                                   │
//!      └ Instance        └ wrong domain / marker                             └ missing field
//!        InstanceNotClass  WrongDomain / Unsupported                           Insufficient
//! ```
//!
//! Each solution matches exhaustively over its domain enum: that match is the
//! registration table of vehicle functions, and a new variant does not compile
//! until every solution of the domain handles it.
//!
//! Names are resolved to classes by [`EngineRegistry`].
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Debug, Display},
};

use crate::{
    astrometry::wcs::TanWcs,
    exarata_errors::{EngineError, ExarataError, InsufficiencyCause, TerminalError},
    propagate::polynomial::PolynomialPropagator,
    table::ColumnTable,
};

/// The five analysis domains.
///
/// The order is the solving order of an image, each domain depending on one
/// earlier in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EngineDomain {
    /// Sky coordinates of the image pixels.
    Astrometry,
    /// Zero point of the image against a star catalog.
    Photometry,
    /// Orbital elements of the asteroid.
    Orbit,
    /// Sky motion predicted from the orbit.
    Ephemeris,
    /// Sky motion fitted from recent observations.
    Propagation,
}

impl EngineDomain {
    /// Every domain, in solving order.
    pub const ALL: [EngineDomain; 5] = [
        EngineDomain::Astrometry,
        EngineDomain::Photometry,
        EngineDomain::Orbit,
        EngineDomain::Ephemeris,
        EngineDomain::Propagation,
    ];
}

impl Display for EngineDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineDomain::Astrometry => "astrometry",
            EngineDomain::Photometry => "photometry",
            EngineDomain::Orbit => "orbit",
            EngineDomain::Ephemeris => "ephemeris",
            EngineDomain::Propagation => "propagation",
        };
        write!(f, "{name}")
    }
}

/// Plate solvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AstrometryEngine {
    /// The nova.astrometry.net web service, needs an API key.
    AstrometryNetWebApi,
}

/// Photometric calibration catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhotometryEngine {
    /// PanSTARRS 3π stacked objects, queried on MAST.
    PanstarrsMastWebApi,
}

/// Orbit determination.
///
/// See also
/// ------------
/// * [`crate::orbit::OrbitalSolution`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrbitEngine {
    /// The local OrbFit installation, fed with an MPC record.
    Orbfit,
    /// Elements given by the caller through [`VehicleArgs`], no fit.
    CustomOrbit,
}

/// Ephemeris services, from an orbit to sky positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EphemerisEngine {
    /// JPL Horizons, with the orbit sent as custom elements.
    JplHorizonsWebApi,
}

/// Polynomial fits of recent sky positions against time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropagationEngine {
    LinearPropagation,
    QuadraticPropagation,
}

/// An engine class of any domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnyEngine {
    /// The abstract marker of a domain, with no provider behind it.
    Marker(EngineDomain),
    Astrometry(AstrometryEngine),
    Photometry(PhotometryEngine),
    Orbit(OrbitEngine),
    Ephemeris(EphemerisEngine),
    Propagation(PropagationEngine),
}

impl AnyEngine {
    pub fn domain(&self) -> EngineDomain {
        match self {
            AnyEngine::Marker(domain) => *domain,
            AnyEngine::Astrometry(_) => EngineDomain::Astrometry,
            AnyEngine::Photometry(_) => EngineDomain::Photometry,
            AnyEngine::Orbit(_) => EngineDomain::Orbit,
            AnyEngine::Ephemeris(_) => EngineDomain::Ephemeris,
            AnyEngine::Propagation(_) => EngineDomain::Propagation,
        }
    }

    /// The class name, as used in log lines and error messages.
    pub fn name(&self) -> String {
        match self {
            AnyEngine::Marker(domain) => format!("{domain} engine marker"),
            AnyEngine::Astrometry(engine) => format!("{engine:?}"),
            AnyEngine::Photometry(engine) => format!("{engine:?}"),
            AnyEngine::Orbit(engine) => format!("{engine:?}"),
            AnyEngine::Ephemeris(engine) => format!("{engine:?}"),
            AnyEngine::Propagation(engine) => format!("{engine:?}"),
        }
    }
}

impl Display for AnyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A domain enum which can be recovered from an [`AnyEngine`].
pub trait DomainEngine: Copy + Debug + Sized {
    const DOMAIN: EngineDomain;

    fn from_any(engine: AnyEngine) -> Option<Self>;

    fn into_any(self) -> AnyEngine;
}

macro_rules! impl_domain_engine {
    ($engine:ident, $variant:ident) => {
        impl DomainEngine for $engine {
            const DOMAIN: EngineDomain = EngineDomain::$variant;

            fn from_any(engine: AnyEngine) -> Option<Self> {
                match engine {
                    AnyEngine::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_any(self) -> AnyEngine {
                AnyEngine::$variant(self)
            }
        }

        impl From<$engine> for AnyEngine {
            fn from(engine: $engine) -> Self {
                AnyEngine::$variant(engine)
            }
        }

        impl From<$engine> for EngineArgument {
            fn from(engine: $engine) -> Self {
                EngineArgument::Class(AnyEngine::$variant(engine))
            }
        }
    };
}

impl_domain_engine!(AstrometryEngine, Astrometry);
impl_domain_engine!(PhotometryEngine, Photometry);
impl_domain_engine!(OrbitEngine, Orbit);
impl_domain_engine!(EphemerisEngine, Ephemeris);
impl_domain_engine!(PropagationEngine, Propagation);

/// A constructed engine, holding whatever state its provider computed.
pub trait ExarataEngine: Debug + Send {
    fn domain(&self) -> EngineDomain;

    fn name(&self) -> String;
}

/// What a caller hands a solution as its engine.
#[derive(Debug)]
pub enum EngineArgument {
    Class(AnyEngine),
    Instance(Box<dyn ExarataEngine>),
}

impl From<AnyEngine> for EngineArgument {
    fn from(engine: AnyEngine) -> Self {
        EngineArgument::Class(engine)
    }
}

impl EngineArgument {
    pub fn instance<E: ExarataEngine + 'static>(engine: E) -> Self {
        EngineArgument::Instance(Box::new(engine))
    }
}

/// Check an engine argument and narrow it to the domain enum `E`.
///
/// Return
/// ----------
/// * [`EngineError::InstanceNotClass`] for an instance,
///   [`EngineError::WrongDomain`] for a class of another domain,
///   [`EngineError::Unsupported`] for a bare domain marker.
pub fn resolve_engine<E: DomainEngine>(argument: &EngineArgument) -> Result<E, EngineError> {
    let class = match argument {
        EngineArgument::Instance(_) => {
            return Err(EngineError::InstanceNotClass { domain: E::DOMAIN })
        }
        EngineArgument::Class(class) => *class,
    };
    if class.domain() != E::DOMAIN {
        return Err(EngineError::WrongDomain {
            engine: class.name(),
            expected: E::DOMAIN,
            found: class.domain(),
        });
    }
    if let AnyEngine::Marker(domain) = class {
        return Err(EngineError::Unsupported {
            domain,
            engine: class.name(),
        });
    }
    match E::from_any(class) {
        Some(engine) => Ok(engine),
        None => TerminalError::LogicFlow(format!(
            "The engine `{class}` passed the {} domain check but is not a {} engine",
            E::DOMAIN,
            E::DOMAIN
        ))
        .halt(),
    }
}

/// A value produced by a vehicle function.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleValue {
    Number(f64),
    Text(String),
    Table(ColumnTable),
    Wcs(TanWcs),
    Propagator(PolynomialPropagator),
}

impl From<f64> for VehicleValue {
    fn from(value: f64) -> Self {
        VehicleValue::Number(value)
    }
}

impl From<String> for VehicleValue {
    fn from(value: String) -> Self {
        VehicleValue::Text(value)
    }
}

impl From<&str> for VehicleValue {
    fn from(value: &str) -> Self {
        VehicleValue::Text(value.to_string())
    }
}

impl From<ColumnTable> for VehicleValue {
    fn from(value: ColumnTable) -> Self {
        VehicleValue::Table(value)
    }
}

impl From<TanWcs> for VehicleValue {
    fn from(value: TanWcs) -> Self {
        VehicleValue::Wcs(value)
    }
}

impl From<PolynomialPropagator> for VehicleValue {
    fn from(value: PolynomialPropagator) -> Self {
        VehicleValue::Propagator(value)
    }
}

/// The field name → value mapping a vehicle function hands its solution.
///
/// Consumed field by field with the `take_*` methods. A field the engine is
/// known not to produce is recorded with [`VehicleResults::mark_unavailable`],
/// so that the two insufficiency causes stay apart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleResults {
    engine: String,
    values: BTreeMap<&'static str, VehicleValue>,
    unavailable: BTreeSet<&'static str>,
}

impl VehicleResults {
    pub fn new(engine: impl Into<String>) -> Self {
        VehicleResults {
            engine: engine.into(),
            ..Default::default()
        }
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn insert(&mut self, field: &'static str, value: impl Into<VehicleValue>) {
        self.unavailable.remove(field);
        self.values.insert(field, value.into());
    }

    pub fn with(mut self, field: &'static str, value: impl Into<VehicleValue>) -> Self {
        self.insert(field, value);
        self
    }

    /// Record that the engine cannot produce `field`.
    pub fn mark_unavailable(&mut self, field: &'static str) {
        self.values.remove(field);
        self.unavailable.insert(field);
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    fn take(&mut self, field: &'static str) -> Result<VehicleValue, EngineError> {
        self.values.remove(field).ok_or_else(|| {
            let cause = if self.unavailable.contains(field) {
                InsufficiencyCause::EngineCannotProvide
            } else {
                InsufficiencyCause::IncompleteVehicle
            };
            EngineError::Insufficient {
                engine: self.engine.clone(),
                field,
                cause,
            }
        })
    }

    fn wrong_kind(&self, field: &str, expected: &str, found: &VehicleValue) -> ! {
        TerminalError::Development(format!(
            "The vehicle of `{}` stored `{field}` as {found:?}, a {expected} is expected",
            self.engine
        ))
        .halt()
    }

    pub fn take_number(&mut self, field: &'static str) -> Result<f64, EngineError> {
        match self.take(field)? {
            VehicleValue::Number(value) => Ok(value),
            other => self.wrong_kind(field, "number", &other),
        }
    }

    pub fn take_text(&mut self, field: &'static str) -> Result<String, EngineError> {
        match self.take(field)? {
            VehicleValue::Text(value) => Ok(value),
            other => self.wrong_kind(field, "text", &other),
        }
    }

    pub fn take_table(&mut self, field: &'static str) -> Result<ColumnTable, EngineError> {
        match self.take(field)? {
            VehicleValue::Table(value) => Ok(value),
            other => self.wrong_kind(field, "table", &other),
        }
    }

    pub fn take_wcs(&mut self, field: &'static str) -> Result<TanWcs, EngineError> {
        match self.take(field)? {
            VehicleValue::Wcs(value) => Ok(value),
            other => self.wrong_kind(field, "WCS", &other),
        }
    }

    pub fn take_propagator(&mut self, field: &'static str) -> Result<PolynomialPropagator, EngineError> {
        match self.take(field)? {
            VehicleValue::Propagator(value) => Ok(value),
            other => self.wrong_kind(field, "propagator", &other),
        }
    }
}

/// Extra per-call numeric arguments for a vehicle function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleArgs {
    values: BTreeMap<String, f64>,
}

impl VehicleArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: f64) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// User facing engine names, case-insensitive.
#[derive(Debug, Clone)]
pub struct EngineRegistry {
    engines: BTreeMap<String, AnyEngine>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        let mut registry = EngineRegistry {
            engines: BTreeMap::new(),
        };
        registry.register("astrometry.net nova", AstrometryEngine::AstrometryNetWebApi.into());
        registry.register("pan-starrs 3pi dr2 mast", PhotometryEngine::PanstarrsMastWebApi.into());
        registry.register("orbfit", OrbitEngine::Orbfit.into());
        registry.register("custom orbit", OrbitEngine::CustomOrbit.into());
        registry.register("jpl horizons", EphemerisEngine::JplHorizonsWebApi.into());
        registry.register("linear", PropagationEngine::LinearPropagation.into());
        registry.register("quadratic", PropagationEngine::QuadraticPropagation.into());
        registry
    }
}

impl EngineRegistry {
    /// Register (or replace) an engine under a name.
    pub fn register(&mut self, name: &str, engine: AnyEngine) {
        self.engines.insert(name.trim().to_lowercase(), engine);
    }

    /// Find an engine by name, optionally restricted to one domain.
    ///
    /// An unknown name, or a name of another domain, is
    /// [`ExarataError::NoSuchEngine`]; there is no default engine.
    pub fn lookup(&self, name: &str, domain: Option<EngineDomain>) -> Result<AnyEngine, ExarataError> {
        self.engines
            .get(&name.trim().to_lowercase())
            .copied()
            .filter(|engine| domain.map_or(true, |d| engine.domain() == d))
            .ok_or_else(|| match domain {
                Some(d) => ExarataError::NoSuchEngine(format!("{name} ({d})")),
                None => ExarataError::NoSuchEngine(name.to_string()),
            })
    }

    /// Registered names of one domain, sorted.
    pub fn names(&self, domain: EngineDomain) -> Vec<&str> {
        self.engines
            .iter()
            .filter(|(_, engine)| engine.domain() == domain)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod engine_test {
    use super::*;

    #[derive(Debug)]
    struct FakeOrbitInstance;

    impl ExarataEngine for FakeOrbitInstance {
        fn domain(&self) -> EngineDomain {
            EngineDomain::Orbit
        }

        fn name(&self) -> String {
            "FakeOrbitInstance".into()
        }
    }

    #[test]
    fn test_domains_listed_in_solving_order() {
        let mut sorted = EngineDomain::ALL;
        sorted.sort();
        assert_eq!(sorted, EngineDomain::ALL);
        assert_eq!(EngineDomain::ALL.first(), Some(&EngineDomain::Astrometry));
        assert_eq!(AnyEngine::from(OrbitEngine::CustomOrbit).domain(), EngineDomain::Orbit);
    }

    #[test]
    fn test_resolve_matching_class() {
        let argument = EngineArgument::from(OrbitEngine::CustomOrbit);
        assert_eq!(resolve_engine::<OrbitEngine>(&argument), Ok(OrbitEngine::CustomOrbit));
    }

    #[test]
    fn test_resolve_wrong_domain() {
        let argument = EngineArgument::from(AstrometryEngine::AstrometryNetWebApi);
        assert_eq!(
            resolve_engine::<OrbitEngine>(&argument),
            Err(EngineError::WrongDomain {
                engine: "AstrometryNetWebApi".into(),
                expected: EngineDomain::Orbit,
                found: EngineDomain::Astrometry,
            })
        );
    }

    #[test]
    fn test_resolve_instance_is_distinct() {
        let argument = EngineArgument::instance(FakeOrbitInstance);
        assert_eq!(
            resolve_engine::<OrbitEngine>(&argument),
            Err(EngineError::InstanceNotClass {
                domain: EngineDomain::Orbit
            })
        );
    }

    #[test]
    fn test_resolve_marker_is_unsupported() {
        let argument = EngineArgument::Class(AnyEngine::Marker(EngineDomain::Propagation));
        assert!(matches!(
            resolve_engine::<PropagationEngine>(&argument),
            Err(EngineError::Unsupported {
                domain: EngineDomain::Propagation,
                ..
            })
        ));
        let other = EngineArgument::Class(AnyEngine::Marker(EngineDomain::Orbit));
        assert!(matches!(
            resolve_engine::<PropagationEngine>(&other),
            Err(EngineError::WrongDomain { .. })
        ));
    }

    #[test]
    fn test_vehicle_results_insufficiency_causes() {
        let mut results = VehicleResults::new("CustomOrbit").with("semimajor_axis", 2.5);
        results.mark_unavailable("eccentricity");

        assert_eq!(results.take_number("semimajor_axis"), Ok(2.5));
        assert_eq!(
            results.take_number("eccentricity"),
            Err(EngineError::Insufficient {
                engine: "CustomOrbit".into(),
                field: "eccentricity",
                cause: InsufficiencyCause::EngineCannotProvide,
            })
        );
        assert_eq!(
            results.take_number("inclination"),
            Err(EngineError::Insufficient {
                engine: "CustomOrbit".into(),
                field: "inclination",
                cause: InsufficiencyCause::IncompleteVehicle,
            })
        );
        // consumed once
        assert!(results.take_number("semimajor_axis").is_err());
    }

    #[test]
    #[should_panic(expected = "Development error")]
    fn test_vehicle_results_wrong_kind_halts() {
        let mut results = VehicleResults::new("x").with("ra", "not a number");
        let _ = results.take_number("ra");
    }

    #[test]
    fn test_registry_lookup() {
        let registry = EngineRegistry::default();
        assert_eq!(
            registry.lookup("OrbFit", None),
            Ok(AnyEngine::Orbit(OrbitEngine::Orbfit))
        );
        assert_eq!(
            registry.lookup(" Quadratic ", Some(EngineDomain::Propagation)),
            Ok(AnyEngine::Propagation(PropagationEngine::QuadraticPropagation))
        );
        assert!(matches!(
            registry.lookup("orbfit", Some(EngineDomain::Ephemeris)),
            Err(ExarataError::NoSuchEngine(_))
        ));
        let unknown = registry.lookup("find_orb", None).unwrap_err();
        assert_eq!(unknown, ExarataError::NoSuchEngine("find_orb".into()));
        assert!(unknown.to_string().contains("no such engine"));
        assert_eq!(registry.names(EngineDomain::Orbit), vec!["custom orbit", "orbfit"]);
    }

    #[test]
    fn test_vehicle_args() {
        let args = VehicleArgs::new().with("semimajor_axis", 2.5);
        assert_eq!(args.get("semimajor_axis"), Some(2.5));
        assert_eq!(args.get("eccentricity"), None);
        assert!(!args.is_empty());
    }
}
