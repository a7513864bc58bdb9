/* -------------------------------------------------------------------------- *\
 *                |   █████╗ ██╗   ██╗██████╗  █████╗ ███████╗ |              *
 *                |  ██╔══██╗██║   ██║██╔══██╗██╔══██╗██╔════╝ |              *
 *                |  ███████║██║   ██║██████╔╝███████║█████╗   |              *
 *                |  ██╔══██║██║   ██║██╔══██╗██╔══██║██╔══╝   |              *
 *                |  ██║  ██║╚██████╔╝██║  ██║██║  ██║███████╗ |              *
 *                |  ╚═╝  ╚═╝ ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝╚══════╝ |              *
 *                +--------------------------------------------+              *
 *                                                                            *
 *                         Distributed Systems Runtime                        *
 * -------------------------------------------------------------------------- *
 * Copyright 2022 - 2024, the aurae contributors                              *
 * SPDX-License-Identifier: Apache-2.0                                        *
\* -------------------------------------------------------------------------- */

//! Static (subject, action) authorization.
//!
//! Subjects are the authenticated identities produced by the transport
//! layer: the base64 encoding of the peer certificate's DER subject. The map
//! is fixed at construction; there is no dynamic mutation.

use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use tonic::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Get,
    Start,
    Stop,
    Stream,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Get => "get",
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Stream => "stream",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum AuthzError {
    #[error("subject '{subject}' is not known")]
    UnknownSubject { subject: String },
    #[error("subject '{subject}' may not {action}")]
    PermissionDenied { subject: String, action: Action },
}

impl From<AuthzError> for Status {
    fn from(err: AuthzError) -> Self {
        let msg = err.to_string();
        match err {
            AuthzError::UnknownSubject { .. } => Status::unauthenticated(msg),
            AuthzError::PermissionDenied { .. } => {
                Status::permission_denied(msg)
            }
        }
    }
}

/// A named bundle of allowed actions.
#[derive(Debug, Clone)]
pub struct Role {
    pub name: &'static str,
    pub actions: HashSet<Action>,
}

impl Role {
    /// Every action.
    pub fn admin() -> Self {
        Self {
            name: "admin",
            actions: HashSet::from([
                Action::Get,
                Action::Start,
                Action::Stop,
                Action::Stream,
            ]),
        }
    }

    /// Read-only access.
    pub fn viewer() -> Self {
        Self {
            name: "viewer",
            actions: HashSet::from([Action::Get, Action::Stream]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub subject: String,
    pub roles: Vec<Role>,
}

#[derive(Debug)]
pub struct Authorizer {
    users: HashMap<String, User>,
}

impl Authorizer {
    pub fn new(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|user| (user.subject.clone(), user))
                .collect(),
        }
    }

    /// The demo users matching the fixture certificates shipped with the
    /// repository. Real deployments construct the map with the base64 DER
    /// subjects of their client certificates.
    pub fn with_fixture_users() -> Self {
        Self::new([
            User { subject: "alice".to_string(), roles: vec![Role::admin()] },
            User { subject: "victor".to_string(), roles: vec![Role::viewer()] },
        ])
    }

    /// Checks that `subject` may perform `action`. Unknown subjects are
    /// reported distinctly from denials.
    pub fn has_access(
        &self,
        subject: &str,
        action: Action,
    ) -> Result<(), AuthzError> {
        let Some(user) = self.users.get(subject) else {
            return Err(AuthzError::UnknownSubject {
                subject: subject.to_string(),
            });
        };

        if user.roles.iter().any(|role| role.actions.contains(&action)) {
            Ok(())
        } else {
            Err(AuthzError::PermissionDenied {
                subject: subject.to_string(),
                action,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Authorizer {
        Authorizer::new([
            User { subject: "alice".into(), roles: vec![Role::admin()] },
            User { subject: "victor".into(), roles: vec![Role::viewer()] },
        ])
    }

    #[test]
    fn admin_may_perform_every_action() {
        let authz = fixture();
        for action in
            [Action::Get, Action::Start, Action::Stop, Action::Stream]
        {
            authz.has_access("alice", action).expect("admin allowed");
        }
    }

    #[test]
    fn viewer_is_denied_mutating_actions() {
        let authz = fixture();
        authz.has_access("victor", Action::Get).expect("viewer may get");
        authz.has_access("victor", Action::Stream).expect("viewer may stream");

        let err = authz
            .has_access("victor", Action::Start)
            .expect_err("viewer may not start");
        assert!(matches!(err, AuthzError::PermissionDenied { .. }));

        let err = authz
            .has_access("victor", Action::Stop)
            .expect_err("viewer may not stop");
        assert!(matches!(err, AuthzError::PermissionDenied { .. }));
    }

    #[test]
    fn unknown_subject_is_distinct_from_denial() {
        let authz = fixture();
        let err = authz
            .has_access("mallory", Action::Get)
            .expect_err("unknown subject");
        assert!(matches!(err, AuthzError::UnknownSubject { .. }));
    }
}
