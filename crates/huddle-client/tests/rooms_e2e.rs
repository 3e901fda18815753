//! Two clients sharing two rooms over an in-memory broadcast.

use huddle_client::{ClientError, EngineAction, Identity, Rooms, SystemEnv};

struct Member {
    rooms: Rooms<SystemEnv>,
    inbox: Vec<(String, Vec<u8>)>,
}

/// Deliver `actions` produced by `from` in `room` to every member in that
/// room, looping until nothing new is broadcast.
fn broadcast(members: &mut [Member], from: usize, room: &str, actions: Vec<EngineAction>) {
    let mut queue: Vec<(usize, Vec<u8>)> = actions
        .into_iter()
        .filter_map(|action| match action {
            EngineAction::Broadcast(outgoing) => Some((from, outgoing.into_bytes())),
            _ => None,
        })
        .collect();

    while let Some((sender, bytes)) = queue.pop() {
        let sender_id = members[sender].rooms.nickname().clone();
        for (index, member) in members.iter_mut().enumerate() {
            if index == sender || !member.rooms.rooms().any(|joined| joined == room) {
                continue;
            }
            for action in member.rooms.receive(room, &sender_id, &bytes).unwrap() {
                match action {
                    EngineAction::Broadcast(outgoing) => queue.push((index, outgoing.into_bytes())),
                    EngineAction::Deliver(message) => {
                        member.inbox.push((room.to_string(), message.body));
                    },
                    _ => {},
                }
            }
        }
    }
}

fn member(nickname: &str) -> Member {
    Member { rooms: Rooms::new(SystemEnv::new(), nickname), inbox: Vec::new() }
}

#[test]
fn messages_stay_in_their_room() {
    let mut members = vec![member("alice"), member("bob")];

    for room in ["lobby", "kitchen"] {
        for index in 0..members.len() {
            let actions = members[index].rooms.join(room).unwrap();
            broadcast(&mut members, index, room, actions);
        }
    }

    let actions = members[0].rooms.send("kitchen", b"soup is ready").unwrap();
    broadcast(&mut members, 0, "kitchen", actions);
    let actions = members[1].rooms.send("lobby", b"on my way").unwrap();
    broadcast(&mut members, 1, "lobby", actions);

    assert_eq!(members[1].inbox, vec![("kitchen".to_string(), b"soup is ready".to_vec())]);
    assert_eq!(members[0].inbox, vec![("lobby".to_string(), b"on my way".to_vec())]);
}

#[test]
fn envelope_from_other_room_is_rejected() {
    let mut members = vec![member("alice"), member("bob")];
    for room in ["lobby", "kitchen"] {
        for index in 0..members.len() {
            let actions = members[index].rooms.join(room).unwrap();
            broadcast(&mut members, index, room, actions);
        }
    }

    let actions = members[0].rooms.send("kitchen", b"kitchen only").unwrap();
    let bytes = actions[0].as_broadcast().unwrap().as_bytes().to_vec();

    let result = members[1].rooms.receive("lobby", &Identity::from("alice"), &bytes);
    assert!(matches!(result, Err(ClientError::Engine(_))), "{result:?}");
    assert!(result.unwrap_err().is_tampering());
}
