/*!
Collecteurs scriptés pour tester l'orchestrateur sans matériel

Chaque collecteur rejoue un `Script` et note les options reçues à la construction,
ce qui permet de vérifier la fusion défauts + surcharges de bout en bout.
*/

use hostscan_kernel::{Collector, CollectorError, CollectorOptions, CollectorOutput};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Comportement rejoué par un `ScriptedCollector`
#[derive(Debug, Clone)]
pub enum Script {
    /// Renvoie cet objet (identifiant machine → payload)
    Succeed(Value),
    /// Échoue avec ce message
    Fail(String),
    /// Panique avec ce message
    Panic(String),
    /// Attend puis renvoie l'objet
    Sleep(Duration, Value),
    /// La fabrique refuse les options
    RejectOptions(String),
}

impl Script {
    /// Un seul appareil `device_id` avec `payload`
    pub fn device(device_id: &str, payload: Value) -> Self {
        let mut output = serde_json::Map::new();
        output.insert(device_id.to_string(), payload);
        Script::Succeed(Value::Object(output))
    }
}

pub struct ScriptedCollector {
    script: Script,
}

impl ScriptedCollector {
    /// Fabrique à enregistrer dans un `CollectorCatalog`.
    /// `seen` reçoit les options de chaque construction.
    pub fn factory(
        script: Script,
        seen: Arc<Mutex<Vec<CollectorOptions>>>,
    ) -> impl Fn(&CollectorOptions) -> Result<Box<dyn Collector>, CollectorError> + Send + Sync + 'static {
        move |options: &CollectorOptions| {
            seen.lock().push(options.clone());
            if let Script::RejectOptions(reason) = &script {
                return Err(CollectorError::InvalidOption {
                    option: "script".to_string(),
                    reason: reason.clone(),
                });
            }
            Ok(Box::new(ScriptedCollector { script: script.clone() }) as Box<dyn Collector>)
        }
    }
}

impl Collector for ScriptedCollector {
    fn collect(&mut self) -> Result<CollectorOutput, CollectorError> {
        match &self.script {
            Script::Succeed(value) => as_output(value),
            Script::Fail(message) => Err(CollectorError::Unavailable(message.clone())),
            Script::Panic(message) => panic!("{}", message),
            Script::Sleep(delay, value) => {
                std::thread::sleep(*delay);
                as_output(value)
            }
            Script::RejectOptions(reason) => Err(CollectorError::Unavailable(reason.clone())),
        }
    }
}

fn as_output(value: &Value) -> Result<CollectorOutput, CollectorError> {
    value
        .as_object()
        .cloned()
        .ok_or_else(|| CollectorError::InvalidOutput("scripted output must be an object".to_string()))
}
