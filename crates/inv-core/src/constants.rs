//! Constantes del motor.
//!
//! Valores por defecto de la política de reintentos y del deadline por step.
//! Se concentran aquí para que `EngineConfig::default()` y los tests hablen de
//! los mismos números.

/// Reintentos adicionales tras el primer intento de un step.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base del backoff exponencial entre reintentos, en milisegundos.
/// Delay efectivo: `base * 2^(attempt-1)`.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 25;

/// Deadline por invocación de capability, en milisegundos.
pub const DEFAULT_STEP_DEADLINE_MS: u64 = 30_000;

/// Reintentos internos de `append` ante `Conflict` (re-read + re-append).
pub const MAX_APPEND_RETRIES: u32 = 3;
