use crate::domain::link::Link;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct LinkRecord<'a> {
    merchant: &'a str,
    user: &'a str,
    balance: String,
}

/// Writes link balances as `merchant,user,balance` CSV.
pub struct LinkWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> LinkWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_links(&mut self, links: impl IntoIterator<Item = Link>) -> Result<()> {
        for link in links {
            self.writer.serialize(LinkRecord {
                merchant: link.merchant_id.as_str(),
                user: link.user_id.as_str(),
                balance: link.balance.to_string(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
