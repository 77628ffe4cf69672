use crate::allocation::{self, Policy, Store, StorePaths};
use crate::config::{Config, Parser};
use crate::error::Result;
use crate::port::{PortProber, SystemProber};
use std::path::{Path, PathBuf};

/// Everything one invocation needs, passed explicitly to each operation.
pub struct Context {
    pub config_dir: PathBuf,
    pub config: Config,
    pub verbose: bool,
    prober: Box<dyn PortProber>,
}

impl Context {
    pub fn new(config_dir: PathBuf, config: Config, verbose: bool) -> Self {
        Self {
            config_dir,
            config,
            verbose,
            prober: Box::new(SystemProber::new()),
        }
    }

    /// Resolve the config directory (explicit, else the default) and load its
    /// `config.yaml`, creating it on first use.
    pub fn load(config_dir: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let parser = Parser::new();
        let config_dir = match config_dir {
            Some(dir) => dir,
            None => parser.default_config_dir()?,
        };
        let config = parser.load_or_init(&config_dir)?;
        Ok(Self::new(config_dir, config, verbose))
    }

    /// Replace the system prober, e.g. with a
    /// [`StaticProber`](crate::port::StaticProber) in tests.
    pub fn with_prober(mut self, prober: impl PortProber + 'static) -> Self {
        self.prober = Box::new(prober);
        self
    }

    pub fn prober(&self) -> &dyn PortProber {
        self.prober.as_ref()
    }

    pub fn policy(&self) -> Policy {
        self.config.policy()
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn store_paths(&self) -> StorePaths {
        StorePaths::new(&self.config_dir)
    }

    /// [`allocation::with_store`] on this context's config directory.
    pub fn with_store<T>(&self, mutate: impl FnOnce(&mut Store) -> Result<T>) -> Result<T> {
        allocation::with_store(&self.config_dir, mutate)
    }

    pub fn read_store(&self) -> Result<Store> {
        allocation::read_store(&self.config_dir)
    }
}
