use resworks::prelude::RwResult;
use resworks::{cli, rw_xml};

fn main() -> RwResult<()> {
    let args = cli::xml().get_matches();
    rw_xml::run(&args)
}
