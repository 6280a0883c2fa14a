//! Infoblox WAPI address store
//!
//! Implements [`AddressStore`] over plain WAPI calls with HTTP basic auth.

use async_trait::async_trait;
use ipnetwork::IpNetwork;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use provisio_core::address::{
    AddressBlock, BlockRef, ContainerInfo, DeleteOutcome, NetworkQuery, NetworkView,
    NewReservation, ParentBlock,
};
use provisio_core::error::{ReconcileError, ReconcileResult};
use provisio_core::traits::AddressStore;

use crate::config::InfobloxConfig;
use crate::wire::{
    AvailableEntry, NextAvailable, WapiContainer, WapiError, WapiNetwork, CONTAINER_FIELDS, NETWORK_FIELDS,
};

/// Address store for one Infoblox grid.
pub struct InfobloxStore {
    config: InfobloxConfig,
    client: Client,
}

impl std::fmt::Debug for InfobloxStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfobloxStore")
            .field("config", &self.config)
            .finish()
    }
}

impl InfobloxStore {
    /// Create a store after validating the configuration.
    pub fn new(config: InfobloxConfig) -> ReconcileResult<Self> {
        config.validate()?;
        let client = Self::build_client(&config)?;
        Ok(Self { config, client })
    }

    fn build_client(config: &InfobloxConfig) -> ReconcileResult<Client> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)));

        if !config.verify_tls {
            warn!(
                base_url = %config.base_url,
                "TLS certificate verification is disabled for Infoblox; credentials may be exposed"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder.build().map_err(|e| ReconcileError::Configuration {
            message: format!("failed to build HTTP client: {e}"),
        })
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(
                self.config.username.as_deref().unwrap_or_default(),
                self.config.password.as_deref(),
            )
            .header(header::ACCEPT, "application/json")
    }

    /// Send a request and return status and body text.
    async fn send(&self, request: RequestBuilder, what: &str) -> ReconcileResult<(StatusCode, String)> {
        let response = self
            .authed(request)
            .send()
            .await
            .map_err(|e| ReconcileError::unavailable_with_source(format!("{what}: request failed"), e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ReconcileError::unavailable_with_source(format!("{what}: failed to read response"), e)
        })?;
        debug!(what, status = %status, bytes = body.len(), "WAPI response");
        Ok((status, body))
    }

    fn parse<T: DeserializeOwned>(body: &str, what: &str) -> ReconcileResult<T> {
        serde_json::from_str(body)
            .map_err(|e| ReconcileError::malformed(format!("{what}: unexpected WAPI response: {e}"), body))
    }

    /// Map a non-success response to the error taxonomy, keeping the body.
    fn handle_response_error(&self, what: &str, status: StatusCode, body: &str) -> ReconcileError {
        let wapi = WapiError::parse(body);

        if let Some(ref err) = wapi {
            if err.is_conflict() {
                return ReconcileError::AlreadyExists {
                    message: format!("{what}: {}", err.text),
                };
            }
            if err.is_not_found() {
                return ReconcileError::not_found(format!("{what}: {}", err.text));
            }
        }

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ReconcileError::unavailable(format!(
                "{what}: HTTP {status}: authentication or authorization failed:\n{body}"
            )),
            StatusCode::NOT_FOUND => ReconcileError::not_found(format!("{what}: {body}")),
            _ => ReconcileError::unavailable(format!("{what}: HTTP {status}:\n{body}")),
        }
    }

    async fn lookup_container(
        &self,
        view: &NetworkView,
        network: IpNetwork,
    ) -> ReconcileResult<Option<ContainerInfo>> {
        let what = "container lookup";
        let network_str = network.to_string();
        let request = self.client.get(self.config.url("networkcontainer")).query(&[
            ("network", network_str.as_str()),
            ("network_view", view.as_str()),
            ("_return_fields", CONTAINER_FIELDS),
        ]);
        let (status, body) = self.send(request, what).await?;
        if !status.is_success() {
            return Err(self.handle_response_error(what, status, &body));
        }

        let containers: Vec<WapiContainer> = Self::parse(&body, what)?;
        containers.into_iter().next().map(WapiContainer::into_info).transpose()
    }

    async fn next_available(
        &self,
        container: &BlockRef,
        prefix_length: u8,
    ) -> ReconcileResult<Option<IpNetwork>> {
        let what = "next available network";
        let request = self
            .client
            .post(self.config.url(container.as_str()))
            .query(&[("_function", "next_available_network")])
            .json(&json!({ "cidr": prefix_length, "num": 1 }));
        let (status, body) = self.send(request, what).await?;

        if !status.is_success() {
            if WapiError::parse(&body).is_some_and(|e| e.is_exhausted()) {
                return Ok(None);
            }
            return Err(self.handle_response_error(what, status, &body));
        }

        let result: NextAvailable = Self::parse(&body, what)?;
        Self::first_network(result.networks.first().map(String::as_str), what, &body)
    }

    /// Next free block addressed by the supernet literal alone.
    async fn next_available_in_supernet(
        &self,
        view: &NetworkView,
        supernet: IpNetwork,
        prefix_length: u8,
    ) -> ReconcileResult<Option<IpNetwork>> {
        let what = "next available network";
        let supernet_str = supernet.to_string();
        let prefix_str = prefix_length.to_string();
        let request = self.client.get(self.config.url("network")).query(&[
            ("network_view", view.as_str()),
            ("network", supernet_str.as_str()),
            ("cidr", prefix_str.as_str()),
            ("num", "1"),
            ("_return_fields", "network,network_view"),
        ]);
        let (status, body) = self.send(request, what).await?;

        if !status.is_success() {
            if WapiError::parse(&body).is_some_and(|e| e.is_exhausted()) {
                return Ok(None);
            }
            return Err(self.handle_response_error(what, status, &body));
        }

        let entries: Vec<AvailableEntry> = Self::parse(&body, what)?;
        Self::first_network(entries.first().map(AvailableEntry::network), what, &body)
    }

    fn first_network(literal: Option<&str>, what: &str, body: &str) -> ReconcileResult<Option<IpNetwork>> {
        match literal {
            None => Ok(None),
            Some(literal) => provisio_core::address::parse_cidr(literal)
                .map(Some)
                .map_err(|e| ReconcileError::malformed(format!("{what}: {e}"), body)),
        }
    }
}

#[async_trait]
impl AddressStore for InfobloxStore {
    fn backend_name(&self) -> &str {
        "infoblox"
    }

    #[instrument(skip(self, query))]
    async fn query_networks(&self, query: &NetworkQuery) -> ReconcileResult<Vec<AddressBlock>> {
        let what = "network search";
        let mut params: Vec<(&str, String)> = vec![("_return_fields", NETWORK_FIELDS.to_string())];
        if let Some(ref view) = query.view {
            params.push(("network_view", view.to_string()));
        }
        if let Some(network) = query.network {
            params.push(("network", network.to_string()));
        }
        if let Some(ref label) = query.label {
            params.push(("comment", label.clone()));
        }

        let request = self.client.get(self.config.url("network")).query(&params);
        let (status, body) = self.send(request, what).await?;
        if !status.is_success() {
            return Err(self.handle_response_error(what, status, &body));
        }

        let networks: Vec<WapiNetwork> = Self::parse(&body, what)?;
        networks
            .into_iter()
            .map(|n| n.into_block(&self.config.site_attribute_name))
            .collect()
    }

    #[instrument(skip(self), fields(view = %view, network = %network))]
    async fn find_container(
        &self,
        view: &NetworkView,
        network: IpNetwork,
    ) -> ReconcileResult<Option<ContainerInfo>> {
        self.lookup_container(view, network).await
    }

    #[instrument(skip(self), fields(view = %view, parent = %parent))]
    async fn allocate_next(
        &self,
        view: &NetworkView,
        parent: &ParentBlock,
        prefix_length: u8,
    ) -> ReconcileResult<Option<IpNetwork>> {
        match parent {
            ParentBlock::Container { reference, .. } => {
                self.next_available(reference, prefix_length).await
            }
            ParentBlock::Network { network } => {
                self.next_available_in_supernet(view, *network, prefix_length).await
            }
        }
    }

    #[instrument(skip(self, request), fields(view = %request.view, network = %request.network))]
    async fn create_network(&self, request: &NewReservation) -> ReconcileResult<AddressBlock> {
        let what = "network create";
        let payload = json!({
            "network": request.network.to_string(),
            "network_view": request.view.as_str(),
            "comment": request.label,
            "extattrs": {
                self.config.site_attribute_name.as_str(): { "value": request.site_attribute }
            }
        });
        let http = self
            .client
            .post(self.config.url("network"))
            .query(&[("_return_fields", NETWORK_FIELDS)])
            .json(&payload);
        let (status, body) = self.send(http, what).await?;
        if !status.is_success() {
            return Err(self.handle_response_error(what, status, &body));
        }

        let created: WapiNetwork = Self::parse(&body, what)?;
        let block = created.into_block(&self.config.site_attribute_name)?;
        info!(network = %block.network, "network created");
        Ok(block)
    }

    #[instrument(skip(self), fields(reference = %reference))]
    async fn delete_network(&self, reference: &BlockRef) -> ReconcileResult<DeleteOutcome> {
        let what = "network delete";
        let request = self.client.delete(self.config.url(reference.as_str()));
        let (status, body) = self.send(request, what).await?;

        if status.is_success() {
            return Ok(DeleteOutcome::Deleted);
        }
        match self.handle_response_error(what, status, &body) {
            ReconcileError::NotFound { .. } => Ok(DeleteOutcome::NotFound),
            other => Err(other),
        }
    }
}
