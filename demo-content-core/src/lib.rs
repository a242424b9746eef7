#![doc = "demo-content-core: core logic library for demo-content."]

//! This crate contains the content-sourcing pipeline that fills a demo site:
//! category lookup, allocation across content-type quotas, article enrichment
//! and probabilistic image attachment. The CMS itself sits behind
//! [`contract::ContentSink`]; sink implementations live in the CLI crate.
//!
//! # Usage
//! Build a [`config::PopulateConfig`], construct the source clients
//! ([`wikipedia::WikipediaClient`], [`images::FeedClient`]) and a sink, then
//! call [`populate::populate`].

pub mod allocate;
pub mod category;
pub mod config;
pub mod contract;
pub mod enrich;
pub mod error;
pub mod images;
pub mod media_cache;
pub mod populate;
pub mod wikipedia;
