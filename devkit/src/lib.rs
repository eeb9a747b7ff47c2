/*!
# hostscan DevKit - Doubles de test pour le pipeline de scan

Bibliothèque facilitant les tests de l'orchestrateur et des stores avec:
- Collecteurs scriptés (succès, erreur, panic, lenteur)
- Exporter enregistreur sans réseau
- Identité machine fixe
- Workspace temporaire complet (catalogue, config, store machine)
*/

pub mod collector_stubs;
pub mod exporter_stub;
pub mod test_utils;

pub use collector_stubs::{Script, ScriptedCollector};
pub use exporter_stub::RecordingExporter;
pub use test_utils::{FixedIdentity, TestWorkspace};
