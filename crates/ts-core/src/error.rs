use thiserror::Error;

/// Errors raised by the analysis pipeline.
///
/// Every variant except [`AnalysisError::DivisionByZero`] is fatal for the
/// current trial. A zero-energy trial is dropped and the session continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Input has the wrong shape or is not an integral/finite number.
    #[error("Type invalide : {0}")]
    TypeMismatch(String),

    /// A value exceeds a hard ceiling that validation should have enforced.
    #[error("Valeur hors limites : {field} = {value} (maximum {max})")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Value received.
        value: f64,
        /// Hard ceiling.
        max: f64,
    },

    /// Validation had to fix too many values to trust the request.
    #[error("Trop d'erreurs sur les arguments : {count} corrections (maximum {max})")]
    TooManyCorrections {
        /// Corrections applied by the validator.
        count: usize,
        /// Accepted maximum.
        max: usize,
    },

    /// Clustering was given an empty spectrum.
    #[error("Aucune donnée spectrale à regrouper")]
    EmptyInput,

    /// The selected harmonics carry no energy (silence).
    #[error("Énergie nulle sur les {harmonics} harmoniques, division impossible")]
    DivisionByZero {
        /// Number of harmonics that were summed.
        harmonics: usize,
    },
}

impl AnalysisError {
    /// `true` when the trial can be skipped and the session continued.
    ///
    /// # Example
    /// ```
    /// use ts_core::error::AnalysisError;
    /// assert!(AnalysisError::DivisionByZero { harmonics: 10 }.is_recoverable());
    /// assert!(!AnalysisError::EmptyInput.is_recoverable());
    /// ```
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DivisionByZero { .. })
    }
}
