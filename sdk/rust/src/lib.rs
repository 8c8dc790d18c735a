//! Typed client for the prior authorization API.

mod client;

pub use client::{
    AuditEvent, AuditTrail, ClientError, ErrorAck, HealthReport, PriorAuthClient, PriorAuthRecord,
    ServiceInfo, Submission,
};
