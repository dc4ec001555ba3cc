use reqwest::Client;

use crate::backend::vendor::VendorClient;

pub struct GenState {
    pub vendor: VendorClient,
    /// Used by the proxy relay for arbitrary asset hosts.
    pub http: Client,
}

impl GenState {
    pub fn new(vendor: VendorClient, http: Client) -> Self {
        Self { vendor, http }
    }
}
