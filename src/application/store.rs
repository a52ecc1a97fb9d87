//! Instrument state store with JSON snapshot persistence

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::alert::{self, Evaluation};
use crate::domain::catalog::{default_catalog, SymbolMap};
use crate::shared::errors::StoreError;
use crate::shared::types::{
    AlertConfig, Instrument, InstrumentKind, KeyLevels, LevelFlags, PriceTick,
};

/// On-disk subset of an instrument: identity and alert configuration.
/// Quote state, key levels, and the interval baseline are volatile and
/// rebuilt from the feed after every restart.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedInstrument {
    id: String,
    symbol: String,
    name: String,
    ticker: String,
    kind: InstrumentKind,
    channel: String,
    #[serde(default)]
    alerts: AlertConfig,
}

impl From<&Instrument> for PersistedInstrument {
    fn from(inst: &Instrument) -> Self {
        Self {
            id: inst.id.clone(),
            symbol: inst.symbol.clone(),
            name: inst.name.clone(),
            ticker: inst.ticker.clone(),
            kind: inst.kind,
            channel: inst.channel.clone(),
            alerts: inst.alerts.clone(),
        }
    }
}

/// Owns every tracked instrument and mediates all mutation. Each tick is
/// evaluated against the instrument's previous state, then merged in; any
/// change to the persisted subset is flushed to disk immediately.
pub struct InstrumentStore {
    path: PathBuf,
    instruments: Vec<Instrument>,
}

impl InstrumentStore {
    /// Load the store, starting from the built-in catalog and layering the
    /// persisted state on top. Catalog entries keep their identity and take
    /// the saved alert config; saved instruments not in the catalog are
    /// kept whole. A missing or unreadable state file falls back to the
    /// plain catalog so a corrupt snapshot never bricks startup.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut instruments = default_catalog();

        match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<PersistedInstrument>>(&raw) {
                Ok(saved) => {
                    merge_persisted(&mut instruments, saved);
                    info!(path = %path.display(), count = instruments.len(), "state loaded");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt state file, using catalog defaults");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no state file, using catalog defaults");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "state file unreadable, using catalog defaults");
            }
        }

        Self { path, instruments }
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let snapshot: Vec<PersistedInstrument> =
            self.instruments.iter().map(PersistedInstrument::from).collect();
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| StoreError::Io(e.to_string()))
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn get(&self, id: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Instrument, StoreError> {
        self.instruments
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| StoreError::UnknownInstrument(id.to_string()))
    }

    /// Symbol map over the current instrument set.
    pub fn symbol_map(&self) -> Result<SymbolMap, StoreError> {
        SymbolMap::from_instruments(self.instruments.iter())
    }

    /// Evaluate alerts against the pre-tick state, then merge the quote in.
    /// Returns the alert messages the tick produced. The snapshot is only
    /// rewritten when the persisted subset changed (a one-shot flag fired).
    pub fn apply_tick(&mut self, tick: &PriceTick) -> Result<Vec<String>, StoreError> {
        let inst = self.get_mut(&tick.instrument_id)?;

        let evaluation = alert::evaluate(inst, tick.price);
        let flags_changed = evaluation.flags != inst.alerts.flags;
        merge_quote(inst, tick.price);
        apply_evaluation(inst, &evaluation);

        if flags_changed {
            self.save()?;
        }
        Ok(evaluation.messages)
    }

    pub fn set_thresholds(
        &mut self,
        id: &str,
        high: Option<f64>,
        low: Option<f64>,
    ) -> Result<(), StoreError> {
        let inst = self.get_mut(id)?;
        inst.alerts.high = high;
        inst.alerts.low = low;
        self.save()
    }

    pub fn set_level_flags(&mut self, id: &str, flags: LevelFlags) -> Result<(), StoreError> {
        let inst = self.get_mut(id)?;
        inst.alerts.flags = flags;
        self.save()
    }

    /// Configure or clear the interval alert. The baseline always restarts
    /// from the next observed price.
    pub fn set_interval(&mut self, id: &str, step: Option<f64>) -> Result<(), StoreError> {
        let inst = self.get_mut(id)?;
        inst.alerts.interval = step.map(|step| crate::shared::types::IntervalAlert {
            step,
            enabled: true,
            baseline: None,
        });
        self.save()
    }

    pub fn set_key_levels(&mut self, id: &str, levels: Option<KeyLevels>) -> Result<(), StoreError> {
        let inst = self.get_mut(id)?;
        inst.key_levels = levels;
        Ok(())
    }

    /// Track a new instrument. Rejects duplicate ids and any ticker that
    /// would collide with an existing subscription on the same channel.
    pub fn add_instrument(&mut self, inst: Instrument) -> Result<(), StoreError> {
        if self.get(&inst.id).is_some() {
            return Err(StoreError::DuplicateSymbol(inst.id));
        }
        SymbolMap::from_instruments(self.instruments.iter().chain(std::iter::once(&inst)))?;

        self.instruments.push(inst);
        self.save()
    }

    pub fn remove_instrument(&mut self, id: &str) -> Result<Instrument, StoreError> {
        let index = self
            .instruments
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| StoreError::UnknownInstrument(id.to_string()))?;
        let removed = self.instruments.remove(index);
        self.save()?;
        Ok(removed)
    }
}

fn merge_persisted(instruments: &mut Vec<Instrument>, saved: Vec<PersistedInstrument>) {
    for mut entry in saved {
        if let Some(inst) = instruments.iter_mut().find(|i| i.id == entry.id) {
            // Catalog identity wins; only the alert config is restored.
            if let Some(interval) = &mut entry.alerts.interval {
                interval.baseline = None;
            }
            inst.alerts = entry.alerts;
        } else {
            let mut inst = Instrument::new(
                entry.id, entry.symbol, entry.name, entry.ticker, entry.kind, entry.channel,
            );
            inst.alerts = entry.alerts;
            inst.reset_volatile();
            instruments.push(inst);
        }
    }
}

fn merge_quote(inst: &mut Instrument, price: f64) {
    if !inst.is_initialized {
        inst.open_price = price;
        inst.high = price;
        inst.low = price;
        inst.is_initialized = true;
    }

    inst.price = price;
    inst.high = inst.high.max(price);
    inst.low = inst.low.min(price);
    inst.change = price - inst.open_price;
    inst.change_percent = if inst.open_price != 0.0 {
        inst.change / inst.open_price * 100.0
    } else {
        0.0
    };
}

fn apply_evaluation(inst: &mut Instrument, evaluation: &Evaluation) {
    inst.alerts.flags = evaluation.flags;
    if let Some(interval) = &mut inst.alerts.interval {
        interval.baseline = evaluation.interval_baseline;
    }
}
