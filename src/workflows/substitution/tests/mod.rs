mod common;
mod recommend;
