pub mod fmspc_tcb_info;
pub mod pck_cert;
pub mod pck_cert_chain;
pub mod pck_crl;
pub mod platform;
pub mod platform_tcb;
pub mod qe_identity;
