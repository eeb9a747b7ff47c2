/**
 * HOSTSCAN KERNEL - Inventaire machine par collecteurs enfichables
 *
 * RÔLE :
 * Tout ce qui ne dépend pas du matériel : catalogue des collecteurs, configuration
 * par installation, store par machine, orchestration des scans et export.
 * Les collecteurs concrets et l'identité machine sont fournis par l'agent.
 *
 * MODULES :
 * - registry     : catalogue des types de collecteurs (data/services.json)
 * - options      : options typées et fusion validante défauts + surcharges
 * - config_store : collecteurs activés et surcharges (data/config.json)
 * - devices      : résultats par machine, merge-on-write (data/machines.json)
 * - collectors   : contrat `Collector`, catalogue de fabriques, collecteurs externes
 * - scanner      : orchestrateur d'un run complet
 * - export       : contrat `Exporter` + export GitHub
 * - paths / settings / storage : plomberie (chemins, réglages, JSON disque)
 */

pub mod collectors;
pub mod config_store;
pub mod devices;
pub mod export;
pub mod options;
pub mod paths;
pub mod registry;
pub mod scanner;
pub mod settings;
pub mod storage;

pub use collectors::{Collector, CollectorCatalog, CollectorError, CollectorOutput, LoadError};
pub use config_store::ConfigStore;
pub use devices::{DeviceIdentity, DeviceRecord, DeviceStore};
pub use export::{ExportBatch, Exporter};
pub use options::{CollectorOptions, OptionKind, OptionSpec, OptionValue};
pub use registry::ServiceRegistry;
pub use scanner::{CollectorRun, ScanOrchestrator, ScanReport, ScanRequest, ScanStage};
pub use settings::Settings;
pub use storage::StoreError;
