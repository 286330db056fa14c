use std::fmt;

use serde::Serialize;

use crate::error::AnalysisError;

/// Longest capture accepted, in seconds.
pub const MAX_DURATION_SECS: u32 = 10;
/// Highest sample rate accepted, in Hz.
pub const MAX_SAMPLE_RATE_HZ: u32 = 48_000;
/// Corrections tolerated before a request is rejected.
pub const MAX_CORRECTIONS: usize = 2;

/// Capture parameter touched by a correction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Capture length in seconds.
    Duration,
    /// Sampling rate in Hz.
    SampleRate,
}

impl Field {
    /// Config/CLI name of the field.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Duration => "duration_secs",
            Self::SampleRate => "sample_rate_hz",
        }
    }
}

/// What the validator did to a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionKind {
    /// Negative value replaced by its magnitude.
    Negated,
    /// Value above the ceiling replaced by the ceiling.
    Clamped,
}

/// A single silent fix applied to a capture parameter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Correction {
    pub field: Field,
    pub kind: CorrectionKind,
    pub from: f64,
    pub to: f64,
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            CorrectionKind::Negated => "valeur négative",
            CorrectionKind::Clamped => "valeur trop élevée",
        };
        write!(
            f,
            "{}: {what}, {} redéfini à {}",
            self.field.name(),
            self.from,
            self.to
        )
    }
}

/// Output of [`validate`]: sanitized values plus the corrections applied.
#[derive(Clone, Debug, PartialEq)]
pub struct Validated {
    pub duration_secs: u32,
    pub sample_rate_hz: u32,
    pub corrections: Vec<Correction>,
}

impl Validated {
    /// Number of corrections the validator had to apply.
    #[must_use]
    pub fn correction_count(&self) -> usize {
        self.corrections.len()
    }
}

/// Sanitize a capture duration and sample rate.
///
/// Negative values are negated, values above the ceilings (10 s, 48 kHz)
/// are clamped, each fix counts as one correction and is logged at `warn`.
/// The validator only reports the count; rejecting a request with too many
/// corrections is the job of [`CaptureRequest::new`].
///
/// # Errors
/// [`AnalysisError::TypeMismatch`] if either value is not a finite integer.
///
/// # Example
/// ```
/// use ts_core::request::validate;
/// let v = validate(-3.0, 96_000.0).unwrap();
/// assert_eq!((v.duration_secs, v.sample_rate_hz, v.correction_count()), (3, 48_000, 2));
/// ```
pub fn validate(duration_secs: f64, sample_rate_hz: f64) -> Result<Validated, AnalysisError> {
    check_integral(Field::Duration, duration_secs)?;
    check_integral(Field::SampleRate, sample_rate_hz)?;

    let mut corrections = Vec::new();
    let duration = sanitize(
        Field::Duration,
        duration_secs,
        f64::from(MAX_DURATION_SECS),
        &mut corrections,
    );
    let rate = sanitize(
        Field::SampleRate,
        sample_rate_hz,
        f64::from(MAX_SAMPLE_RATE_HZ),
        &mut corrections,
    );

    Ok(Validated {
        duration_secs: duration as u32,
        sample_rate_hz: rate as u32,
        corrections,
    })
}

fn check_integral(field: Field, value: f64) -> Result<(), AnalysisError> {
    if value.is_finite() && value.fract() == 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::TypeMismatch(format!(
            "{} doit être un entier, reçu {value}",
            field.name()
        )))
    }
}

fn sanitize(field: Field, value: f64, max: f64, corrections: &mut Vec<Correction>) -> f64 {
    let mut value = value;
    if value < 0.0 {
        value = push(corrections, field, CorrectionKind::Negated, value, -value);
    }
    if value > max {
        value = push(corrections, field, CorrectionKind::Clamped, value, max);
    }
    value
}

fn push(
    corrections: &mut Vec<Correction>,
    field: Field,
    kind: CorrectionKind,
    from: f64,
    to: f64,
) -> f64 {
    let correction = Correction {
        field,
        kind,
        from,
        to,
    };
    log::warn!("{correction}");
    corrections.push(correction);
    to
}

/// Validated capture parameters handed to an [`crate::traits::AudioSource`].
///
/// Created per trial and consumed immediately by the capture source.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureRequest {
    duration_secs: u32,
    sample_rate_hz: u32,
    corrections: Vec<Correction>,
}

impl CaptureRequest {
    /// Validate raw parameters and build a request.
    ///
    /// # Errors
    /// [`AnalysisError::TypeMismatch`] for non-integral input,
    /// [`AnalysisError::TooManyCorrections`] when more than
    /// [`MAX_CORRECTIONS`] values had to be fixed.
    ///
    /// # Example
    /// ```
    /// use ts_core::request::CaptureRequest;
    /// let req = CaptureRequest::new(15.0, 96_000.0).unwrap();
    /// assert_eq!(req.duration_secs(), 10);
    /// assert!(CaptureRequest::new(-15.0, 96_000.0).is_err());
    /// ```
    pub fn new(duration_secs: f64, sample_rate_hz: f64) -> Result<Self, AnalysisError> {
        let validated = validate(duration_secs, sample_rate_hz)?;
        let count = validated.correction_count();
        if count > MAX_CORRECTIONS {
            return Err(AnalysisError::TooManyCorrections {
                count,
                max: MAX_CORRECTIONS,
            });
        }
        Ok(Self {
            duration_secs: validated.duration_secs,
            sample_rate_hz: validated.sample_rate_hz,
            corrections: validated.corrections,
        })
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    #[must_use]
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Corrections applied while validating.
    #[must_use]
    pub fn corrections(&self) -> &[Correction] {
        &self.corrections
    }

    /// Number of mono samples a capture of this request yields.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.duration_secs as usize * self.sample_rate_hz as usize
    }
}
