mod config;
mod fragment;
mod marshal;
