pub mod config;
pub mod db;
pub mod hub;
pub mod push;
pub mod renderer;
pub mod web;
