//! Case lifecycle engine.
//!
//! Every state change of an expediente goes through [`transition`]: one
//! closed table deciding which `(state, event)` pairs are legal and what
//! they produce. Nothing else in the crate is allowed to compute a new
//! `estado` value. Actor requirements live next to the table in
//! [`required_role`] so a role mismatch and an illegal transition stay
//! distinguishable failure kinds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::models::history::HistorialEntry;
use crate::types::Role;

/// The six case states, stored as their lowercase names in
/// `expedientes.estado`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseState {
    Borrador,
    Pendiente,
    EnProgreso,
    Validado,
    Enviado,
    Completado,
}

impl CaseState {
    pub const ALL: [CaseState; 6] = [
        CaseState::Borrador,
        CaseState::Pendiente,
        CaseState::EnProgreso,
        CaseState::Validado,
        CaseState::Enviado,
        CaseState::Completado,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CaseState::Borrador => "borrador",
            CaseState::Pendiente => "pendiente",
            CaseState::EnProgreso => "en_progreso",
            CaseState::Validado => "validado",
            CaseState::Enviado => "enviado",
            CaseState::Completado => "completado",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    /// Intake fields and child records may only change while in draft
    pub fn editable(self) -> bool {
        matches!(self, CaseState::Borrador)
    }

    /// Completed cases are retired: no edits, no transitions, no deletion
    pub fn deletable(self) -> bool {
        !matches!(self, CaseState::Completado)
    }
}

impl std::fmt::Display for CaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events an actor can fire against a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseEvent {
    /// Operative submits a draft for coordination review
    Enviar,
    /// Coordinator approves a submitted case. `legado` selects the
    /// historical `enviado` target instead of `validado`; the two are
    /// treated as equivalent predecessors of `en_progreso`.
    Aprobar { legado: bool },
    /// Coordinator returns a submitted case to draft with a reason
    Devolver,
    /// Coordinator starts work on an approved case
    Iniciar,
    /// Coordinator closes an in-progress case
    Completar,
}

impl CaseEvent {
    pub fn name(self) -> &'static str {
        match self {
            CaseEvent::Enviar => "enviar_revision",
            CaseEvent::Aprobar { .. } => "aprobar",
            CaseEvent::Devolver => "devolver",
            CaseEvent::Iniciar => "iniciar",
            CaseEvent::Completar => "completar",
        }
    }
}

impl std::fmt::Display for CaseEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("el expediente en estado '{from}' no admite la operacion '{event}'")]
    InvalidTransition { from: CaseState, event: &'static str },

    #[error("el rol {actual} no puede ejecutar '{event}' (requiere {required})")]
    RoleNotAllowed {
        event: &'static str,
        required: Role,
        actual: Role,
    },
}

/// The transition table. Returns the target state for a legal
/// `(state, event)` pair and [`LifecycleError::InvalidTransition`] for
/// everything else.
pub fn transition(from: CaseState, event: CaseEvent) -> Result<CaseState, LifecycleError> {
    use CaseEvent::*;
    use CaseState::*;

    match (from, event) {
        (Borrador, Enviar) => Ok(Pendiente),
        (Pendiente, Aprobar { legado: false }) => Ok(Validado),
        (Pendiente, Aprobar { legado: true }) => Ok(Enviado),
        (Pendiente, Devolver) => Ok(Borrador),
        (Validado, Iniciar) | (Enviado, Iniciar) => Ok(EnProgreso),
        (EnProgreso, Completar) => Ok(Completado),
        _ => Err(LifecycleError::InvalidTransition {
            from,
            event: event.name(),
        }),
    }
}

/// The only role allowed to fire each event.
pub fn required_role(event: CaseEvent) -> Role {
    match event {
        CaseEvent::Enviar => Role::Operativo,
        CaseEvent::Aprobar { .. }
        | CaseEvent::Devolver
        | CaseEvent::Iniciar
        | CaseEvent::Completar => Role::CoordinadorArea,
    }
}

/// Check the actor before consulting the table, so a wrong role surfaces
/// as an authorization failure even when the from-state would also have
/// been wrong.
pub fn ensure_actor(event: CaseEvent, actor: Role) -> Result<(), LifecycleError> {
    let required = required_role(event);
    if actor == required {
        Ok(())
    } else {
        Err(LifecycleError::RoleNotAllowed {
            event: event.name(),
            required,
            actual: actor,
        })
    }
}

/// The rejection reason shown to the operative: the `detalle` of the most
/// recent coordination return in the case's audit trail. Entries must be
/// ordered oldest-to-newest, as the trail endpoint returns them. Unflagged
/// entries never qualify, whatever their text says.
pub fn latest_return_reason(trail: &[HistorialEntry]) -> Option<&str> {
    trail
        .iter()
        .rev()
        .find(|e| e.es_devolucion_coordinacion && e.estado_hasta == CaseState::Borrador.as_str())
        .and_then(|e| e.detalle.as_deref())
}
