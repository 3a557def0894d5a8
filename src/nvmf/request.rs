//! `spdk_nvmf_request_exec` / `_complete` / `_complete_on_qpair` /
//! `_exec_on_master`, generalized to this core's dispatch primitives.
//!
//! A request arriving on its queue-pair's CPU either runs inline there
//! (an I/O command on an I/O qpair: no hop needed, `complete_on_qpair`
//! runs on the spot) or is handed to the master CPU for Fabric/Admin
//! processing (`exec_on_master`), whose completion is then routed back
//! to the originating qpair's CPU. Both hops are the same `send_to`
//! primitive the core exposes to any caller (§4.5/§6); this module adds
//! no new mechanism, it only exercises the existing one from a second
//! layer.

use crate::core::dispatch::send_to;
use crate::error::CoreError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which kind of queue-pair a request arrived on. I/O qpairs carry
/// only I/O commands; the admin qpair also carries Fabric commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QpairType {
    Io,
    Admin,
}

/// A minimal stand-in for `struct spdk_nvmf_request`: enough fields to
/// decide routing and observe completion, nothing transport- or
/// command-specific.
pub struct NvmfRequest {
    /// The CPU running the queue-pair this request arrived on; also
    /// where its completion must be delivered.
    pub qpair_cpu: u32,
    pub qpair_type: QpairType,
    /// `cmd->opc == SPDK_NVME_OPC_FABRIC` in the original.
    pub is_fabric: bool,
    completed: AtomicBool,
}

impl NvmfRequest {
    pub fn new(qpair_cpu: u32, qpair_type: QpairType, is_fabric: bool) -> Self {
        NvmfRequest {
            qpair_cpu,
            qpair_type,
            is_fabric,
            completed: AtomicBool::new(false),
        }
    }

    /// Fabric commands and anything on the admin qpair are handled on
    /// the master CPU; plain I/O commands on an I/O qpair are handled
    /// where they arrived.
    fn needs_master_hop(&self) -> bool {
        self.is_fabric || self.qpair_type == QpairType::Admin
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }
}

/// Dispatch `req` for processing (`spdk_nvmf_request_exec`). `process`
/// plays the role of `spdk_nvmf_ctrlr_process_fabrics_cmd`/
/// `_process_admin_cmd`: it runs on `master_cpu` for requests that need
/// the hop, returning `true` if the request completed synchronously
/// (asynchronous completion, e.g. after an I/O round-trip, is outside
/// this illustration's scope).
pub fn request_exec<F>(
    req: Arc<NvmfRequest>,
    master_cpu: u32,
    process: F,
) -> Result<(), CoreError>
where
    F: Fn(&NvmfRequest) -> bool + Send + 'static,
{
    if req.needs_master_hop() {
        send_to(master_cpu, move || {
            if process(&req) {
                let _ = request_complete(req);
            }
        })
    } else {
        complete_on_qpair(&req);
        Ok(())
    }
}

/// Complete `req` (`spdk_nvmf_request_complete`): Fabric/admin requests
/// hop back to their originating qpair CPU; plain I/O requests, which
/// never left it, complete in place.
fn request_complete(req: Arc<NvmfRequest>) -> Result<(), CoreError> {
    if req.needs_master_hop() {
        let origin = req.qpair_cpu;
        send_to(origin, move || complete_on_qpair(&req))
    } else {
        complete_on_qpair(&req);
        Ok(())
    }
}

fn complete_on_qpair(req: &NvmfRequest) {
    req.completed.store(true, Ordering::SeqCst);
    debug!(
        "nvmf request on qpair cpu {} completed (fabric={}, admin={})",
        req.qpair_cpu,
        req.is_fabric,
        req.qpair_type == QpairType::Admin
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_command_on_io_qpair_completes_inline() {
        let req = Arc::new(NvmfRequest::new(0, QpairType::Io, false));
        assert!(!req.needs_master_hop());
        complete_on_qpair(&req);
        assert!(req.is_completed());
    }

    #[test]
    fn fabric_command_needs_a_master_hop() {
        let req = NvmfRequest::new(3, QpairType::Io, true);
        assert!(req.needs_master_hop());
    }

    #[test]
    fn admin_qpair_command_needs_a_master_hop() {
        let req = NvmfRequest::new(3, QpairType::Admin, false);
        assert!(req.needs_master_hop());
    }
}
