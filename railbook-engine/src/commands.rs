use std::collections::HashMap;

use railbook_catalog::TrainSchedule;
use railbook_order::{BuyOutcome, BuyRequest, OrderStatus};
use railbook_search::{SortKey, SortKeyError, TicketOption};
use railbook_shared::{format_instant, parse_time_of_day, ServiceDate, TimeParseError};

use crate::engine::{EngineError, RunTimetable, TicketEngine};
use crate::identity::{NewUser, ProfileUpdate, User};

/// Result of dispatching one protocol line.
#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch {
    Reply(String),
    Exit,
}

#[derive(Debug, thiserror::Error)]
enum CommandError {
    #[error("Missing argument -{0}")]
    MissingArg(char),

    #[error("Bad argument: {0}")]
    BadArg(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error(transparent)]
    Time(#[from] TimeParseError),

    #[error(transparent)]
    SortKey(#[from] SortKeyError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Parses and runs one `cmd -k value ...` line against the engine,
/// producing the legacy text reply. Every failure inside the engine is a
/// typed error; text appears only here, as the `-1` line.
pub fn dispatch_line(engine: &mut TicketEngine, line: &str) -> Dispatch {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Dispatch::Reply("-1".to_string());
    };
    if cmd == "exit" {
        return Dispatch::Exit;
    }
    let args = parse_args(parts);
    let reply = run_command(engine, cmd, &args).unwrap_or_else(|err| {
        tracing::debug!(cmd, %err, "command rejected");
        "-1".to_string()
    });
    Dispatch::Reply(reply)
}

fn parse_args<'a>(mut parts: impl Iterator<Item = &'a str>) -> HashMap<char, &'a str> {
    let mut args = HashMap::new();
    while let Some(token) = parts.next() {
        let mut chars = token.chars();
        if let (Some('-'), Some(key), None) = (chars.next(), chars.next(), chars.next()) {
            if let Some(value) = parts.next() {
                args.insert(key, value);
            }
        }
    }
    args
}

fn run_command(
    engine: &mut TicketEngine,
    cmd: &str,
    args: &HashMap<char, &str>,
) -> Result<String, CommandError> {
    match cmd {
        "add_user" => {
            let user = NewUser {
                username: arg(args, 'u')?.to_string(),
                password: arg(args, 'p')?.to_string(),
                name: arg(args, 'n')?.to_string(),
                email: arg(args, 'm')?.to_string(),
                privilege: parse_num(args.get(&'g').copied().unwrap_or("0"))?,
            };
            engine.add_user(args.get(&'c').copied(), user)?;
            Ok("0".to_string())
        }
        "login" => {
            engine.login(arg(args, 'u')?, arg(args, 'p')?)?;
            Ok("0".to_string())
        }
        "logout" => {
            engine.logout(arg(args, 'u')?)?;
            Ok("0".to_string())
        }
        "query_profile" => {
            let user = engine.query_profile(arg(args, 'c')?, arg(args, 'u')?)?;
            Ok(format_profile(user))
        }
        "modify_profile" => {
            let update = ProfileUpdate {
                password: args.get(&'p').map(|s| s.to_string()),
                name: args.get(&'n').map(|s| s.to_string()),
                email: args.get(&'m').map(|s| s.to_string()),
                privilege: args.get(&'g').map(|s| parse_num(s)).transpose()?,
            };
            let user = engine.modify_profile(arg(args, 'c')?, arg(args, 'u')?, update)?;
            Ok(format_profile(user))
        }
        "add_train" => {
            engine.add_train(parse_train(args)?)?;
            Ok("0".to_string())
        }
        "release_train" => {
            engine.release_train(arg(args, 'i')?)?;
            Ok("0".to_string())
        }
        "delete_train" => {
            engine.delete_train(arg(args, 'i')?)?;
            Ok("0".to_string())
        }
        "query_train" => {
            let date: ServiceDate = parse_num(arg(args, 'd')?)?;
            let timetable = engine.query_timetable(arg(args, 'i')?, date)?;
            Ok(format_timetable(&timetable))
        }
        "query_ticket" => {
            let date: ServiceDate = parse_num(arg(args, 'd')?)?;
            let key: SortKey = args.get(&'p').copied().unwrap_or("time").parse()?;
            let options = engine.query_ticket(arg(args, 's')?, arg(args, 't')?, date, key);
            let mut lines = vec![options.len().to_string()];
            lines.extend(options.iter().map(format_ticket_option));
            Ok(lines.join("\n"))
        }
        "query_transfer" => {
            let date: ServiceDate = parse_num(arg(args, 'd')?)?;
            let key: SortKey = args.get(&'p').copied().unwrap_or("time").parse()?;
            match engine.query_transfer(arg(args, 's')?, arg(args, 't')?, date, key) {
                Some(plan) => Ok(format!(
                    "{}\n{}",
                    format_ticket_option(&plan.first),
                    format_ticket_option(&plan.second)
                )),
                None => Ok("0".to_string()),
            }
        }
        "buy_ticket" => {
            let request = BuyRequest {
                username: arg(args, 'u')?,
                train_id: arg(args, 'i')?,
                date: parse_num(arg(args, 'd')?)?,
                from: arg(args, 'f')?,
                to: arg(args, 't')?,
                count: parse_num(arg(args, 'n')?)?,
                allow_queue: args.get(&'q').copied() == Some("true"),
            };
            match engine.buy_ticket(request)? {
                BuyOutcome::Purchased { total_price, .. } => Ok(total_price.to_string()),
                BuyOutcome::Queued { .. } => Ok("queue".to_string()),
            }
        }
        "query_order" => {
            let orders = engine.query_orders(arg(args, 'u')?)?;
            let mut lines = vec![orders.len().to_string()];
            lines.extend(orders.iter().map(|order| {
                format!(
                    "[{}] {} {} {} -> {} {} {} {}",
                    format_status(order.status),
                    order.train_id,
                    order.from,
                    format_instant(order.departure),
                    order.to,
                    format_instant(order.arrival),
                    order.unit_price,
                    order.count
                )
            }));
            Ok(lines.join("\n"))
        }
        "refund_ticket" => {
            let index = args.get(&'n').map(|s| parse_num(s)).transpose()?.unwrap_or(1);
            engine.refund_ticket(arg(args, 'u')?, index)?;
            Ok("0".to_string())
        }
        "clean" => {
            engine.clean();
            Ok("0".to_string())
        }
        other => Err(CommandError::UnknownCommand(other.to_string())),
    }
}

fn arg<'a>(args: &HashMap<char, &'a str>, key: char) -> Result<&'a str, CommandError> {
    args.get(&key).copied().ok_or(CommandError::MissingArg(key))
}

fn parse_num<T: std::str::FromStr>(s: &str) -> Result<T, CommandError>
where
    T::Err: std::fmt::Display,
{
    s.parse()
        .map_err(|err| CommandError::BadArg(format!("{s}: {err}")))
}

fn parse_piped_u32(s: &str) -> Result<Vec<u32>, CommandError> {
    if s == "_" {
        return Ok(Vec::new());
    }
    s.split('|').map(parse_num).collect()
}

fn parse_train(args: &HashMap<char, &str>) -> Result<TrainSchedule, CommandError> {
    let station_count: usize = parse_num(arg(args, 'n')?)?;
    let stations: Vec<String> = arg(args, 's')?.split('|').map(str::to_string).collect();
    if stations.len() != station_count {
        return Err(CommandError::BadArg(format!(
            "expected {station_count} stations, got {}",
            stations.len()
        )));
    }
    let (first, last) = arg(args, 'd')?
        .split_once('|')
        .ok_or_else(|| CommandError::BadArg("sale window".to_string()))?;
    let seat_class = arg(args, 'y')?
        .chars()
        .next()
        .ok_or_else(|| CommandError::BadArg("seat class".to_string()))?;
    Ok(TrainSchedule {
        train_id: arg(args, 'i')?.to_string(),
        stations,
        seat_count: parse_num(arg(args, 'm')?)?,
        prices: parse_piped_u32(arg(args, 'p')?)?,
        start_time: parse_time_of_day(arg(args, 'x')?)?,
        travel_minutes: parse_piped_u32(arg(args, 't')?)?,
        stopover_minutes: parse_piped_u32(arg(args, 'o')?)?,
        sale_first: parse_num(first)?,
        sale_last: parse_num(last)?,
        seat_class,
        released: false,
    })
}

fn format_profile(user: &User) -> String {
    format!(
        "{} {} {} {}",
        user.username, user.name, user.email, user.privilege
    )
}

fn format_status(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Success => "success",
        OrderStatus::Pending => "pending",
        OrderStatus::Refunded => "refunded",
    }
}

fn format_ticket_option(option: &TicketOption) -> String {
    format!(
        "{} {} {} -> {} {} {} {}",
        option.train_id,
        option.from,
        format_instant(option.departure),
        option.to,
        format_instant(option.arrival),
        option.price,
        option.remaining
    )
}

fn format_timetable(timetable: &RunTimetable) -> String {
    let mut lines = vec![format!("{} {}", timetable.train_id, timetable.seat_class)];
    for row in &timetable.rows {
        let arrival = row
            .arrival
            .map(format_instant)
            .unwrap_or_else(|| "xx-xx xx:xx".to_string());
        let departure = row
            .departure
            .map(format_instant)
            .unwrap_or_else(|| "xx-xx xx:xx".to_string());
        let seats = row
            .remaining
            .map(|n| n.to_string())
            .unwrap_or_else(|| "x".to_string());
        lines.push(format!(
            "{} {} -> {} {} {}",
            row.station, arrival, departure, row.price_from_origin, seats
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn reply(engine: &mut TicketEngine, line: &str) -> String {
        match dispatch_line(engine, line) {
            Dispatch::Reply(text) => text,
            Dispatch::Exit => panic!("unexpected exit"),
        }
    }

    fn engine() -> TicketEngine {
        TicketEngine::new(&Config::default())
    }

    #[test]
    fn test_parse_args_pairs_flags_with_values() {
        let args = parse_args("-u alice -p secret_1 -g 5".split_whitespace());
        assert_eq!(args.get(&'u'), Some(&"alice"));
        assert_eq!(args.get(&'p'), Some(&"secret_1"));
        assert_eq!(args.get(&'g'), Some(&"5"));
    }

    #[test]
    fn test_unknown_and_malformed_commands_reply_minus_one() {
        let mut engine = engine();
        assert_eq!(reply(&mut engine, "frobnicate -x 1"), "-1");
        assert_eq!(reply(&mut engine, "login -u ghost"), "-1");
    }

    #[test]
    fn test_user_round_trip() {
        let mut engine = engine();
        assert_eq!(
            reply(
                &mut engine,
                "add_user -u root -p secret_1 -n Root -m root@a.com"
            ),
            "0"
        );
        assert_eq!(reply(&mut engine, "login -u root -p secret_1"), "0");
        assert_eq!(
            reply(&mut engine, "query_profile -c root -u root"),
            "root Root root@a.com 10"
        );
        assert_eq!(reply(&mut engine, "logout -u root"), "0");
    }

    #[test]
    fn test_add_and_query_train() {
        let mut engine = engine();
        assert_eq!(
            reply(
                &mut engine,
                "add_train -i G1 -n 3 -m 100 -s east|mid|west -p 100|200 \
                 -x 08:00 -t 60|90 -o 10 -d 06-01|06-30 -y G"
            ),
            "0"
        );
        let listing = reply(&mut engine, "query_train -i G1 -d 06-05");
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines[0], "G1 G");
        assert_eq!(lines[1], "east xx-xx xx:xx -> 06-05 08:00 0 100");
        assert_eq!(lines[2], "mid 06-05 09:00 -> 06-05 09:10 100 100");
        assert_eq!(lines[3], "west 06-05 10:40 -> xx-xx xx:xx 300 x");

        // Out of sale window.
        assert_eq!(reply(&mut engine, "query_train -i G1 -d 07-05"), "-1");
    }

    #[test]
    fn test_two_station_train_uses_underscore_stopovers() {
        let mut engine = engine();
        assert_eq!(
            reply(
                &mut engine,
                "add_train -i K2 -n 2 -m 50 -s north|south -p 80 \
                 -x 10:00 -t 45 -o _ -d 06-01|06-30 -y K"
            ),
            "0"
        );
        assert_eq!(reply(&mut engine, "release_train -i K2"), "0");
        let listing = reply(&mut engine, "query_ticket -s north -t south -d 06-02");
        assert_eq!(
            listing,
            "1\nK2 north 06-02 10:00 -> south 06-02 10:45 80 50"
        );
    }

    #[test]
    fn test_buy_and_order_listing() {
        let mut engine = engine();
        reply(
            &mut engine,
            "add_user -u root -p secret_1 -n Root -m root@a.com",
        );
        reply(&mut engine, "login -u root -p secret_1");
        reply(
            &mut engine,
            "add_train -i G1 -n 2 -m 10 -s east|west -p 100 \
             -x 08:00 -t 120 -o _ -d 06-01|06-30 -y G",
        );
        reply(&mut engine, "release_train -i G1");

        assert_eq!(
            reply(
                &mut engine,
                "buy_ticket -u root -i G1 -d 06-10 -n 3 -f east -t west"
            ),
            "300"
        );
        assert_eq!(
            reply(&mut engine, "query_order -u root"),
            "1\n[success] G1 east 06-10 08:00 -> west 06-10 10:00 100 3"
        );
        assert_eq!(reply(&mut engine, "refund_ticket -u root -n 1"), "0");
        assert_eq!(
            reply(&mut engine, "query_order -u root"),
            "1\n[refunded] G1 east 06-10 08:00 -> west 06-10 10:00 100 3"
        );
    }

    #[test]
    fn test_query_transfer_empty_is_zero_not_error() {
        let mut engine = engine();
        assert_eq!(
            reply(&mut engine, "query_transfer -s here -t there -d 06-10"),
            "0"
        );
    }

    #[test]
    fn test_exit_and_clean() {
        let mut engine = engine();
        assert_eq!(reply(&mut engine, "clean"), "0");
        assert_eq!(dispatch_line(&mut engine, "exit"), Dispatch::Exit);
    }
}
