//! Implementation of the TRAPI REST API server.

use actix_web::web::Data;
use clap::Parser;
use indexmap::IndexMap;
use tracing::info;

use crate::query::assemble::Provenance;
use crate::query::semsim::SemsimClient;
use crate::trapi::{MetaEdge, MetaKnowledgeGraph, MetaNode, BIOLINK_SIMILAR_TO};

/// Data to keep in the web server.
pub struct WebServerData {
    /// Shared client for the similarity search service.
    pub client: SemsimClient,
    /// Provenance configuration for assembled edges.
    pub provenance: Provenance,
    /// Static description of the answerable knowledge.
    pub meta_kg: MetaKnowledgeGraph,
}

/// Implementation of the actix server.
pub mod actix_server {
    use actix_web::{middleware::Logger, web::Data, App, HttpServer, ResponseError};

    use super::{Args, WebServerData};

    #[derive(Debug)]
    struct CustomError {
        err: anyhow::Error,
    }

    impl std::fmt::Display for CustomError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self.err)
        }
    }

    impl CustomError {
        fn new(err: anyhow::Error) -> Self {
            CustomError { err }
        }
    }

    impl ResponseError for CustomError {}

    // Code for `/query`.
    pub mod query {
        use actix_web::{
            post,
            web::{Data, Json},
            Responder,
        };

        use crate::server::WebServerData;
        use crate::trapi::ReasonerRequest;

        use super::CustomError;

        /// Answer a multi-CURIE TRAPI query.
        #[post("/query")]
        async fn handle(
            data: Data<WebServerData>,
            request: Json<ReasonerRequest>,
        ) -> actix_web::Result<impl Responder, CustomError> {
            let response =
                crate::query::answer(&request.into_inner(), &data.client, &data.provenance)
                    .await
                    .map_err(|e| CustomError::new(e.into()))?;
            Ok(Json(response))
        }
    }

    // Code for `/meta_knowledge_graph`.
    pub mod meta_knowledge_graph {
        use actix_web::{
            get,
            web::{Data, Json},
            Responder,
        };

        use crate::server::WebServerData;

        use super::CustomError;

        /// Return the static meta knowledge graph.
        #[get("/meta_knowledge_graph")]
        async fn handle(
            data: Data<WebServerData>,
        ) -> actix_web::Result<impl Responder, CustomError> {
            Ok(Json(data.meta_kg.clone()))
        }
    }

    #[actix_web::main]
    pub async fn main(args: &Args, data: Data<WebServerData>) -> std::io::Result<()> {
        HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .service(query::handle)
                .service(meta_knowledge_graph::handle)
                .wrap(Logger::default())
        })
        .bind((args.listen_host.as_str(), args.listen_port))?
        .run()
        .await
    }
}

/// Command line arguments for `server run` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Run TRAPI REST API server", long_about = None)]
pub struct Args {
    /// IP to listen on.
    #[arg(long, default_value = "127.0.0.1")]
    pub listen_host: String,
    /// Port to listen on.
    #[arg(long, default_value_t = 8080)]
    pub listen_port: u16,

    /// URL scheme of the similarity search service.
    #[arg(long, default_value = "http")]
    pub semsim_scheme: String,
    /// Host of the similarity search service.
    #[arg(long, default_value = "api-v3.monarchinitiative.org")]
    pub semsim_host: String,
    /// Port of the similarity search service, when not the scheme default.
    #[arg(long)]
    pub semsim_port: Option<u16>,
    /// Path of the similarity search endpoint.
    #[arg(long, default_value = "/v3/api/semsim/search")]
    pub semsim_search_path: String,
    /// Comparison group to search within.
    #[arg(long, default_value = "Human Diseases")]
    pub semsim_group: String,
    /// Timeout of the outbound similarity search call, in seconds.
    #[arg(long, default_value_t = 600)]
    pub semsim_timeout_secs: u64,

    /// The `infores` tag this service identifies itself with.
    #[arg(long, default_value = "infores:monarch-mcq")]
    pub provenance_tag: String,
}

/// Build the similarity search endpoint URL from the arguments.
fn endpoint_url(args: &Args) -> String {
    match args.semsim_port {
        Some(port) => format!(
            "{}://{}:{}{}",
            args.semsim_scheme, args.semsim_host, port, args.semsim_search_path
        ),
        None => format!(
            "{}://{}{}",
            args.semsim_scheme, args.semsim_host, args.semsim_search_path
        ),
    }
}

/// Build the static meta knowledge graph document.
fn build_meta_kg() -> MetaKnowledgeGraph {
    let mut nodes = IndexMap::new();
    nodes.insert(
        "biolink:PhenotypicFeature".to_string(),
        MetaNode {
            id_prefixes: vec!["HP".to_string()],
        },
    );
    nodes.insert(
        "biolink:Disease".to_string(),
        MetaNode {
            id_prefixes: vec!["MONDO".to_string()],
        },
    );
    MetaKnowledgeGraph {
        nodes,
        edges: vec![MetaEdge {
            subject: "biolink:PhenotypicFeature".to_string(),
            predicate: BIOLINK_SIMILAR_TO.to_string(),
            object: "biolink:Disease".to_string(),
        }],
    }
}

/// Main entry point for `server run` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    info!("args_common = {:?}", &args_common);
    info!("args = {:?}", &args);

    if let Some(level) = args_common.verbose.log_level() {
        match level {
            log::Level::Trace | log::Level::Debug => {
                std::env::set_var("RUST_LOG", "debug");
                env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
            }
            _ => (),
        }
    }

    let endpoint = endpoint_url(args);
    info!("Using similarity search endpoint {}", &endpoint);
    let client = SemsimClient::new(
        endpoint,
        args.semsim_group.clone(),
        std::time::Duration::from_secs(args.semsim_timeout_secs),
    )?;
    let provenance = Provenance {
        trapi_source: args.provenance_tag.clone(),
        ..Provenance::default()
    };
    let data = Data::new(WebServerData {
        client,
        provenance,
        meta_kg: build_meta_kg(),
    });

    info!("Launching server ...");
    actix_server::main(args, data)?;

    info!("All done. Have a nice day!");
    Ok(())
}
