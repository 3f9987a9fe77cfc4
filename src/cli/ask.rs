use crate::ai::{ask, HttpInference};
use crate::cli::Session;
use crate::error::Result;

pub async fn run(question: &str) -> Result<()> {
    let s = Session::open()?;
    let service = HttpInference::from_settings(&s.settings)?;
    let reply = ask(&service, &s.state, question).await?;
    println!("{reply}");
    Ok(())
}
