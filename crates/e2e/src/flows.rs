//! Console flows
//!
//! Reusable user journeys through the console (creating and deleting
//! clusters, generating the discovery ISO, following host discovery and
//! installation) built from page actions and polled expectations.

use std::time::Duration;

use tracing::info;

use crate::api::{bearer_from, ApiClient};
use crate::config::{DeadlineClass, RunConfig};
use crate::error::{E2eError, E2eResult};
use crate::page::{Page, Probe};
use crate::poll::{Comparison, Expectation, Observation, Observed, Poller};
use crate::selectors::*;

const NOT_READY_MESSAGE: &str = "The cluster is not ready to be installed yet";
const NAME_TAKEN_MESSAGE: &str = "is already taken";
const NO_SUBNETS: &str = "No subnets available";
const NEW_CLUSTER_TITLE: &str = "New Bare Metal OpenShift Cluster";

/// A browsing session bound to a run configuration
pub struct Console<'a> {
    page: &'a dyn Page,
    config: &'a RunConfig,
    poller: Poller,
}

impl<'a> Console<'a> {
    pub fn new(page: &'a dyn Page, config: &'a RunConfig) -> Self {
        Self {
            page,
            config,
            poller: Poller::new(),
        }
    }

    pub fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    pub fn page(&self) -> &'a dyn Page {
        self.page
    }

    pub fn config(&self) -> &'a RunConfig {
        self.config
    }

    pub fn deadline(&self, class: DeadlineClass) -> Duration {
        self.config.timeouts.get(class)
    }

    // Expectations

    /// Wait until `probe` of `selector` satisfies `expectation`
    pub async fn expect(
        &self,
        selector: &str,
        probe: Probe,
        expectation: Expectation,
        class: DeadlineClass,
    ) -> E2eResult<Observed> {
        self.expect_within(selector, probe, expectation, self.deadline(class)).await
    }

    /// [`expect`](Self::expect) with an explicit deadline
    pub async fn expect_within(
        &self,
        selector: &str,
        probe: Probe,
        expectation: Expectation,
        deadline: Duration,
    ) -> E2eResult<Observed> {
        let observation = Observation::probe(self.page, selector, probe);
        self.poller.wait_for(&observation, &expectation, deadline).await
    }

    /// Check `probe` of `selector` once, without waiting
    pub async fn expect_now(&self, selector: &str, probe: Probe, expectation: Expectation) -> E2eResult<Observed> {
        let observed = self.page.read(selector, probe).await?;
        if expectation.is_met(&observed) {
            Ok(observed)
        } else {
            Err(E2eError::AssertionFailed(format!(
                "{:?} of {} expected to {}, found {}",
                probe, selector, expectation, observed
            )))
        }
    }

    pub async fn expect_text(&self, selector: &str, text: &str) -> E2eResult<()> {
        self.expect(selector, Probe::Text, Expectation::contains(text), DeadlineClass::Command)
            .await
            .map(drop)
    }

    pub async fn expect_value(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.expect(selector, Probe::Value, Expectation::equals(value), DeadlineClass::Command)
            .await
            .map(drop)
    }

    pub async fn expect_present(&self, selector: &str) -> E2eResult<()> {
        self.expect(selector, Probe::Exists, Expectation::Present, DeadlineClass::Command)
            .await
            .map(drop)
    }

    pub async fn expect_absent(&self, selector: &str) -> E2eResult<()> {
        self.expect(selector, Probe::Exists, Expectation::Absent, DeadlineClass::Command)
            .await
            .map(drop)
    }

    pub async fn expect_visible(&self, selector: &str) -> E2eResult<()> {
        self.expect(selector, Probe::Visible, Expectation::IsTrue, DeadlineClass::Command)
            .await
            .map(drop)
    }

    pub async fn expect_hidden(&self, selector: &str) -> E2eResult<()> {
        self.expect(selector, Probe::Visible, Expectation::Hidden, DeadlineClass::Command)
            .await
            .map(drop)
    }

    pub async fn expect_count(&self, selector: &str, count: usize) -> E2eResult<()> {
        self.expect(selector, Probe::Count, Expectation::count(Comparison::Eq, count), DeadlineClass::Command)
            .await
            .map(drop)
    }

    // Form helpers

    /// Paste long text the way a user would, then nudge the field so the
    /// form registers the change
    pub async fn paste_text(&self, selector: &str, text: &str) -> E2eResult<()> {
        self.page.fill(selector, text).await?;
        self.page.type_text(selector, " ").await?;
        self.page.press(selector, "Backspace").await
    }

    /// Replace the content of a text field
    pub async fn retype(&self, selector: &str, text: &str) -> E2eResult<()> {
        self.page.clear(selector).await?;
        self.page.type_text(selector, text).await
    }

    // Cluster lifecycle

    pub async fn open_cluster(&self, cluster_name: &str) -> E2eResult<()> {
        self.page.visit("").await?;
        self.page.click(&cluster_link(cluster_name)).await?;
        self.expect_text(BREADCRUMB_CLUSTER, cluster_name).await?;
        self.expect_value(NAME_FIELD, cluster_name).await
    }

    /// Create a cluster and wait for its details page
    pub async fn create_cluster(&self, cluster_name: &str) -> E2eResult<()> {
        info!("Creating cluster {}", cluster_name);
        self.page.visit("").await?;
        self.fill_new_cluster_form(cluster_name).await?;
        self.page.submit(FORM).await?;
        self.expect_visible(DOWNLOAD_ISO_BUTTON).await?;
        self.expect_value(NAME_FIELD, cluster_name).await
    }

    /// Open the new cluster form and fill it without saving
    pub async fn create_dummy_cluster(&self, cluster_name: &str) -> E2eResult<()> {
        self.fill_new_cluster_form(cluster_name).await
    }

    async fn fill_new_cluster_form(&self, cluster_name: &str) -> E2eResult<()> {
        self.page.click(CREATE_CLUSTER_BUTTON).await?;
        self.expect_visible(MODAL).await?;
        self.expect_text(MODAL_HEADER, NEW_CLUSTER_TITLE).await?;
        self.expect_visible(NAME_FIELD).await?;
        self.retype(NAME_FIELD, cluster_name).await?;
        self.expect_value(NAME_FIELD, cluster_name).await?;
        self.page.clear(PULL_SECRET_FIELD).await?;
        self.paste_text(PULL_SECRET_FIELD, &self.config.pull_secret).await
    }

    /// Leave the new cluster form without saving
    pub async fn cancel_dummy_cluster(&self) -> E2eResult<()> {
        self.page.click(SECONDARY_BUTTON).await?;
        self.expect_hidden(MODAL).await?;
        self.expect_hidden(NAME_FIELD).await
    }

    /// Saving a cluster under a taken name must be refused on the spot
    pub async fn assert_duplicate_name_rejected(&self, cluster_name: &str) -> E2eResult<()> {
        self.create_dummy_cluster(cluster_name).await?;
        self.page.click(SAVE_BUTTON).await?;
        self.expect_now(NAME_FIELD_HELPER, Probe::Text, Expectation::contains(NAME_TAKEN_MESSAGE))
            .await?;
        self.cancel_dummy_cluster().await
    }

    /// Back from cluster details to the clusters list
    pub async fn close_cluster_details(&self) -> E2eResult<()> {
        self.page.click(CLOSE_CLUSTER_BUTTON).await
    }

    /// Delete a cluster through the kebab menu of its table row
    pub async fn delete_dummy_cluster(&self, row: usize, cluster_name: &str) -> E2eResult<()> {
        info!("Deleting cluster {}", cluster_name);
        self.page.click(&kebab(row)).await?;
        self.page.click(&delete_cluster_button(cluster_name)).await?;
        self.page.click(DELETE_CLUSTER_SUBMIT).await?;

        self.expect(&cluster_link(cluster_name), Probe::Exists, Expectation::Absent, DeadlineClass::ApiRequest)
            .await?;
        self.expect_present(&cluster_link(&self.config.test_infra_cluster.name)).await
    }

    /// The pre-provisioned cluster is listed, ready, with all its hosts
    pub async fn assert_test_cluster_presence(&self) -> E2eResult<()> {
        let cluster = &self.config.test_infra_cluster;
        self.page.visit("/clusters").await?;
        self.expect_text(&cluster_link(&cluster.name), &cluster.name).await?;
        self.expect_text(&cluster_table_cell(1, "Base domain"), &cluster.base_domain).await?;
        self.expect_text(&cluster_table_cell(1, "Version"), &cluster.openshift_version).await?;
        self.expect(
            &cluster_table_cell(1, "Status"),
            Probe::Text,
            Expectation::contains("Ready"),
            DeadlineClass::ApiRequest,
        )
        .await?;
        self.expect_text(&cluster_table_cell(1, "Hosts"), &cluster.hostnames.len().to_string())
            .await
    }

    pub async fn visit_test_cluster(&self) -> E2eResult<()> {
        self.assert_test_cluster_presence().await?;
        self.page.visit("/clusters").await?;
        self.page.click(&cluster_link(&self.config.test_infra_cluster.name)).await
    }

    /// The cluster exists according to the API
    pub async fn verify_cluster_creation_api(&self, cluster_name: &str) -> E2eResult<()> {
        self.expect_cluster_listed(cluster_name, true).await
    }

    /// Wait until the API lists the cluster, or stops listing it
    pub async fn expect_cluster_listed(&self, cluster_name: &str, present: bool) -> E2eResult<()> {
        let api = ApiClient::new(&self.config.api_base_url, self.deadline(DeadlineClass::ApiRequest))?;
        let bearer = bearer_from(self.page).await?;
        let observation = Observation::cluster_names(&api, bearer);
        let listed = Expectation::includes(cluster_name);
        let expectation = if present { listed } else { listed.not() };
        self.poller
            .wait_for(&observation, &expectation, self.deadline(DeadlineClass::ApiRequest))
            .await
            .map(drop)
    }

    // Discovery and installation

    /// Generate the discovery ISO.
    ///
    /// The generation request can outlive the browser's own request timeout,
    /// in which case the browser aborts it and the console reports a failed
    /// download. That abort is retried once.
    pub async fn generate_iso(&self) -> E2eResult<()> {
        info!("Generating discovery ISO");
        self.page.click(DOWNLOAD_ISO_BUTTON).await?;
        self.expect_visible(ISO_MODAL_TITLE).await?;
        self.paste_text(SSH_PUBLIC_KEY_DISCOVERY_FIELD, &self.config.ssh_pub_key).await?;
        self.expect_text(MODAL_PRIMARY, "Get Discovery ISO").await?;

        // Only aborts caused by the generation request count.
        self.page.take_aborted_requests().await?;

        let page = self.page;
        let observation = Observation::text(page, MODAL_PRIMARY);
        let outcome = self
            .poller
            .poll_with_abort_retry(
                move |attempt| async move {
                    if attempt > 0 {
                        self.expect_text(ALERT, "Failed to download").await?;
                        self.expect(
                            MODAL_PRIMARY,
                            Probe::Text,
                            Expectation::contains("Get Discovery ISO"),
                            DeadlineClass::IsoGeneration,
                        )
                        .await?;
                        // Aborts seen while the alert came up belong to the failed attempt.
                        page.take_aborted_requests().await?;
                    }
                    page.click(MODAL_PRIMARY).await
                },
                move || async move { Ok(!page.take_aborted_requests().await?.is_empty()) },
                &observation,
                &Expectation::contains("Download Discovery ISO"),
                self.deadline(DeadlineClass::IsoGeneration),
            )
            .await?;
        outcome.into_result()?;

        self.page.click(ISO_MODAL_CLOSE).await
    }

    /// Open the "not ready" alert and look for `expected` in it
    pub async fn check_validation_message(&self, expected: &str) -> E2eResult<()> {
        self.expect_text(NOT_READY_BUTTON, NOT_READY_MESSAGE).await?;
        self.expect_hidden(ALERT).await?;
        self.page.click(NOT_READY_BUTTON).await?;
        self.expect_visible(ALERT).await?;
        self.expect_text(ALERT_DESCRIPTION, expected).await?;

        self.page.click(CLOSE_ALERTS).await?;
        self.expect_hidden(ALERT).await
    }

    pub async fn start_cluster_installation(&self) -> E2eResult<()> {
        self.expect(INSTALL_BUTTON, Probe::Enabled, Expectation::IsTrue, DeadlineClass::ValidateChanges)
            .await?;
        self.page.click(INSTALL_BUTTON).await?;
        info!("Cluster installation started");
        Ok(())
    }

    pub async fn wait_for_cluster_installation(&self) -> E2eResult<()> {
        self.expect(
            PROGRESS_DESCRIPTION,
            Probe::Text,
            Expectation::contains("Installed"),
            DeadlineClass::ClusterCreation,
        )
        .await?;
        info!("Cluster installed");
        Ok(())
    }

    /// Every booted host has a row in the hosts table
    pub async fn wait_for_host_table_population(&self) -> E2eResult<()> {
        self.expect(
            HOSTS_TABLE_BODIES,
            Probe::Count,
            Expectation::count(Comparison::Eq, self.config.num_hosts()),
            DeadlineClass::HostRegistration,
        )
        .await
        .map(drop)
    }

    pub async fn wait_for_pending_input_state(&self) -> E2eResult<()> {
        self.wait_for_host_status("Pending input").await
    }

    pub async fn wait_for_hosts_to_be_known(&self) -> E2eResult<()> {
        self.wait_for_host_status("Known").await
    }

    async fn wait_for_host_status(&self, status: &str) -> E2eResult<()> {
        for index in 0..self.config.num_hosts() {
            self.expect(
                &host_detail(host_row(index), "Status"),
                Probe::Text,
                Expectation::contains(status),
                DeadlineClass::HostDiscovery,
            )
            .await?;
        }
        info!("All {} hosts are {}", self.config.num_hosts(), status);
        Ok(())
    }

    /// The host subnet dropdown offers a real subnet
    pub async fn wait_for_hosts_subnet(&self) -> E2eResult<()> {
        let first_option = format!("{} option", HOST_SUBNET_FIELD);
        self.expect(
            &first_option,
            Probe::Text,
            Expectation::All(vec![Expectation::Present, Expectation::equals(NO_SUBNETS).not()]),
            DeadlineClass::HostDiscovery,
        )
        .await
        .map(drop)
    }

    /// Set the base DNS domain, or leave it empty
    pub async fn set_cluster_dns_domain(&self, dns_domain: Option<&str>) -> E2eResult<()> {
        self.page.clear(BASE_DNS_DOMAIN_FIELD).await?;
        if let Some(domain) = dns_domain {
            self.page.type_text(BASE_DNS_DOMAIN_FIELD, domain).await?;
            self.expect_value(BASE_DNS_DOMAIN_FIELD, domain).await?;
        }
        Ok(())
    }

    /// Pick the first subnet offered
    pub async fn set_cluster_subnet_cidr(&self) -> E2eResult<()> {
        self.page.select_option(HOST_SUBNET_FIELD, 0).await
    }

    /// Masters first, then workers, in table order
    pub async fn set_hosts_role(&self) -> E2eResult<()> {
        self.page.click(NAME_FIELD).await?;
        self.page.press(NAME_FIELD, "End").await?;
        self.page.press(NAME_FIELD, "Home").await?;

        let masters = self.config.num_masters;
        for index in 0..self.config.num_hosts() {
            let row = host_row(index);
            let role = if index < masters { "master" } else { "worker" };
            self.page.click(&host_detail(row, "Role")).await?;
            self.page.click(&host_role_option(row, role)).await?;
        }
        Ok(())
    }

    pub async fn save_cluster_details(&self) -> E2eResult<()> {
        self.expect(SAVE_BUTTON, Probe::Enabled, Expectation::IsTrue, DeadlineClass::ValidateChanges)
            .await?;
        self.page.click(SAVE_BUTTON).await
    }
}
