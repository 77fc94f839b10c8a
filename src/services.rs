use std::thread::JoinHandle;

use anyhow::{anyhow, Context, Result};
use cloud::CloudOcrService;
use ocr::OcrService;

use crate::config::AppConfig;

pub mod cloud;
pub mod ocr;

/// Holds instanciated services.
pub struct Services {
    pub ocr: Box<dyn OcrService>,
    pub cloud: Box<dyn CloudOcrService>,
}

impl Services {
    /// Create a new `Services` from the services specified in the given `AppConfig`.
    pub fn new(config: &AppConfig) -> Result<Self> {
        Self::from_services(
            config.ocr_service.create_service(),
            config.cloud_service.create_service(),
        )
    }

    /// Initialise already created services.
    pub fn from_services(
        ocr: Box<dyn OcrService>,
        cloud: Box<dyn CloudOcrService>,
    ) -> Result<Self> {
        let mut services = Self { ocr, cloud };

        services.ocr.init()?;
        services.cloud.init()?;

        log::info!(
            "Services ready: local `{}`, cloud `{}`",
            services.ocr.name(),
            services.cloud.name()
        );

        Ok(services)
    }

    /// Terminate every service, saving their configuration.
    pub fn terminate(&mut self) -> Result<()> {
        self.ocr
            .terminate()
            .with_context(|| format!("Failed to terminate OCR Service `{}`", self.ocr.name()))?;
        self.cloud.terminate().with_context(|| {
            format!(
                "Failed to terminate cloud OCR Service `{}`",
                self.cloud.name()
            )
        })?;
        Ok(())
    }
}

impl Drop for Services {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            log::error!("{e:?}");
        }
    }
}

/// A job being performed by a service. May or may not be finished.
///
/// A job produces exactly one value, which can only be taken once.
pub struct ServiceJob<T> {
    handle: Option<JoinHandle<T>>,
}

impl<T: Send + 'static> ServiceJob<T> {
    pub fn new<F: FnOnce() -> T + Send + 'static>(f: F) -> Self {
        std::thread::spawn(f).into()
    }
}

impl<T> ServiceJob<T> {
    /// Get the return value of this `ServiceJob` if it was finished.
    ///
    /// - Returns `Err` if the job has already finished and its return value was taken previously,
    ///   or if the job panicked;
    /// - Returns `Ok(None)` if the job has not finished yet;
    /// - Returns `Ok(Some(T))` if the job has finished.
    pub fn try_wait(&mut self) -> Result<Option<T>> {
        match self.handle.take() {
            None => Err(anyhow!("job already finished")),
            Some(handle) if handle.is_finished() => join(handle).map(Some),
            Some(handle) => {
                self.handle = Some(handle);
                Ok(None)
            }
        }
    }

    /// Wait for the job to finish and return its return value.
    ///
    /// - Returns `Err` if the job has already finished (eg. by calling `try_wait()`) and its return value was taken previously,
    ///   or if the job panicked;
    /// - Returns `Ok(T)` if the job has finished.
    #[cfg(test)]
    pub fn wait(mut self) -> Result<T> {
        match self.handle.take() {
            None => Err(anyhow!("job already finished")),
            Some(handle) => join(handle),
        }
    }
}

fn join<T>(handle: JoinHandle<T>) -> Result<T> {
    handle
        .join()
        .map_err(|_| anyhow!("service job panicked before producing a result"))
}

impl<T> From<JoinHandle<T>> for ServiceJob<T> {
    fn from(handle: JoinHandle<T>) -> Self {
        ServiceJob {
            handle: Some(handle),
        }
    }
}
